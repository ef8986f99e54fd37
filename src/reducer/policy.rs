//! Reduction Policies
//!
//! Pure consolidation functions. Each takes the replies of the replicas that
//! answered, in configured replica order, and produces the output lines for the
//! dispatcher (without the sentinel). Replica order is the only tie-break; the
//! order in which replies arrived over the network never matters.

use super::command::unknown_command_message;
use super::fragments::{array_body, extract_field, split_top_level_objects};
use super::types::*;

use std::collections::HashSet;

pub fn apply(command: &Command, replies: &[String]) -> Vec<String> {
    match command.policy {
        Policy::AggregateCounts => reduce_counts(replies),
        Policy::Mutation(kind) => vec![reduce_mutation(kind, replies)],
        Policy::Search => vec![reduce_search(replies)],
        Policy::Detail => vec![reduce_detail(replies)],
        Policy::Unknown => vec![unknown_command_message(&command.keyword)],
    }
}

// --- Aggregate counts ---

/// Merges `name:amount|name:amount` lists.
///
/// The same name reported by several replicas is one logical entity, so only
/// its first occurrence counts toward the total.
pub fn reduce_counts(replies: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut entries: Vec<(String, i64)> = Vec::new();
    let mut total: i64 = 0;

    for reply in replies {
        if reply.is_empty() {
            continue;
        }
        if let Some(detail) = reply.strip_prefix(ERROR_TAG) {
            tracing::warn!("Replica reported an error for a sales query: {}", detail);
            continue;
        }

        for pair in reply.split('|') {
            if pair.is_empty() {
                continue;
            }

            match parse_amount_pair(pair) {
                Ok((name, amount)) => {
                    if seen.insert(name.to_string()) {
                        total = total.saturating_add(amount);
                        entries.push((name.to_string(), amount));
                    }
                }
                Err(e) => tracing::warn!("Skipping malformed sales entry: {}", e),
            }
        }
    }

    let mut lines: Vec<String> = entries
        .into_iter()
        .map(|(name, amount)| format!("\"{}\": {}", name, amount))
        .collect();
    lines.push(format!("\"total\": {}", total));
    lines
}

pub fn parse_amount_pair(pair: &str) -> Result<(&str, i64), MalformedReply> {
    let fields: Vec<&str> = pair.split(':').collect();
    let [name, amount] = fields[..] else {
        return Err(MalformedReply::BadPair(pair.to_string()));
    };

    let name = name.trim();
    let amount = amount.trim();
    let parsed = amount.parse::<i64>().map_err(|_| MalformedReply::BadAmount {
        name: name.to_string(),
        amount: amount.to_string(),
    })?;

    Ok((name, parsed))
}

// --- Catalog mutations ---

/// Any single `SUCCESS` makes the whole mutation a success, reported from the
/// last success in replica order. Without one, every `ERROR` detail is joined.
pub fn reduce_mutation(kind: MutationKind, replies: &[String]) -> String {
    let mut last_success: Option<&str> = None;
    let mut errors: Vec<&str> = Vec::new();

    for reply in replies {
        if let Some(payload) = reply.strip_prefix(SUCCESS_TAG) {
            last_success = Some(payload);
        } else if let Some(detail) = reply.strip_prefix(ERROR_TAG) {
            errors.push(detail);
        } else {
            tracing::warn!("Ignoring untagged reply to {:?}: {}", kind, reply);
        }
    }

    match last_success {
        Some(payload) => success_message(kind, payload),
        None => {
            let detail = if errors.is_empty() {
                UNKNOWN_ERROR.to_string()
            } else {
                errors.join("; ")
            };
            failure_message(kind, &detail)
        }
    }
}

fn success_message(kind: MutationKind, payload: &str) -> String {
    let fields: Vec<&str> = payload.split('|').collect();
    let field = |idx: usize| fields.get(idx).copied().unwrap_or("");
    let store = field(0);

    match kind {
        MutationKind::AddStore => format!("Store added: {}", store),
        MutationKind::AddProduct => format!("Product added to store: {}", store),
        MutationKind::RemoveProduct => format!("Product removed from store: {}", store),
        MutationKind::Purchase => {
            let quantity = numeric_field::<i64>("quantity", fields.get(2).copied());
            format!("Purchase completed: {} of {} from {}", quantity, field(1), store)
        }
        MutationKind::Review => {
            let rating = numeric_field::<f64>("rating", fields.get(1).copied());
            let votes = numeric_field::<i64>("vote count", fields.get(2).copied());
            format!(
                "Review submitted for store: {} (new rating: {} from {} votes)",
                store,
                format_rating(rating),
                votes
            )
        }
    }
}

fn failure_message(kind: MutationKind, detail: &str) -> String {
    match kind {
        MutationKind::AddStore => format!("Error adding store: {}", detail),
        MutationKind::AddProduct => format!("Error adding product: {}", detail),
        MutationKind::RemoveProduct => format!("Error removing product: {}", detail),
        MutationKind::Purchase => format!("Error: Purchase failed - {}", detail),
        MutationKind::Review => format!("Error: Failed to submit review - {}", detail),
    }
}

/// Missing fields read as zero; unparsable ones are logged and read as zero.
fn numeric_field<T>(name: &'static str, raw: Option<&str>) -> T
where
    T: std::str::FromStr + Default,
{
    let Some(raw) = raw else {
        return T::default();
    };

    match parse_numeric_field(name, raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("{}", e);
            T::default()
        }
    }
}

pub fn parse_numeric_field<T: std::str::FromStr>(
    name: &'static str,
    raw: &str,
) -> Result<T, MalformedReply> {
    raw.trim().parse::<T>().map_err(|_| MalformedReply::BadField {
        field: name,
        value: raw.to_string(),
    })
}

fn format_rating(rating: f64) -> String {
    if rating.fract() == 0.0 {
        format!("{:.1}", rating)
    } else {
        rating.to_string()
    }
}

// --- Search ---

#[derive(Debug, PartialEq, Eq, Hash)]
enum Identity {
    Named(String),
    /// Objects without an identity field are only collapsed when byte-identical.
    Anonymous(String),
}

/// Concatenates every replica's objects into one array, keeping the first
/// object seen for each store name.
pub fn reduce_search(replies: &[String]) -> String {
    let mut seen: HashSet<Identity> = HashSet::new();
    let mut survivors: Vec<&str> = Vec::new();

    for reply in replies {
        let Some(content) = array_body(reply) else {
            tracing::warn!("Skipping non-array search reply: {}", reply);
            continue;
        };

        for object in split_top_level_objects(content) {
            let identity = match extract_field(object, IDENTITY_FIELD) {
                Some(name) => Identity::Named(name),
                None => {
                    tracing::debug!("Search result without {}: {}", IDENTITY_FIELD, object);
                    Identity::Anonymous(object.to_string())
                }
            };

            if seen.insert(identity) {
                survivors.push(object);
            }
        }
    }

    format!("[{}]", survivors.join(","))
}

// --- Detail lookup ---

pub fn reduce_detail(replies: &[String]) -> String {
    replies
        .iter()
        .find(|reply| {
            let body = reply.trim();
            !body.is_empty() && !body.starts_with(ERROR_TAG)
        })
        .cloned()
        .unwrap_or_else(|| STORE_NOT_FOUND_MESSAGE.to_string())
}
