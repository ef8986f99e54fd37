use super::types::{Command, MutationKind, Policy};

impl Command {
    /// Splits `<KEYWORD> <data>` on the first space and resolves the policy.
    pub fn parse(line: &str) -> Self {
        let (keyword, data) = line.split_once(' ').unwrap_or((line, ""));

        Self {
            keyword: keyword.to_string(),
            data: data.to_string(),
            line: line.to_string(),
            policy: Policy::for_keyword(keyword),
        }
    }
}

impl Policy {
    pub fn for_keyword(keyword: &str) -> Self {
        match keyword {
            "GET_SALES_BY_STORE_TYPE_CATEGORY"
            | "GET_SALES_BY_PRODUCT_CATEGORY"
            | "GET_SALES_BY_PRODUCT" => Policy::AggregateCounts,

            "ADD_STORE" => Policy::Mutation(MutationKind::AddStore),
            "ADD_PRODUCT" => Policy::Mutation(MutationKind::AddProduct),
            "REMOVE_PRODUCT" => Policy::Mutation(MutationKind::RemoveProduct),
            "BUY" => Policy::Mutation(MutationKind::Purchase),
            "REVIEW" => Policy::Mutation(MutationKind::Review),

            "FILTER_STORES" | "FIND_STORES_WITHIN_RANGE" => Policy::Search,

            "GET_STORE_DETAILS" => Policy::Detail,

            _ => Policy::Unknown,
        }
    }
}

pub fn unknown_command_message(keyword: &str) -> String {
    format!("Reducer Error: Unknown command for reduction: {}", keyword)
}
