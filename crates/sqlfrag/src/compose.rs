//! Fragment composition: joining and hygienic parameter merging.
//!
//! Two independently-authored fragments are free to pick the same placeholder
//! name for different values. Merging renames the later occurrence to a fresh
//! `paramK` name so both values survive, the way alpha-renaming avoids
//! variable capture.

use crate::error::FragmentResult;
use crate::fragment::{SqlFragment, scan_placeholders};
use crate::params::ParamMap;

/// A piece of SQL accepted by the composing operations: raw text with an
/// optional parameter set, or an already-built fragment.
///
/// Resolved once at the API boundary; raw text is promoted through full
/// fragment construction before any merging happens.
#[derive(Clone, Debug)]
pub enum SqlInput {
    Text { sql: String, params: ParamMap },
    Fragment(SqlFragment),
}

impl SqlInput {
    /// Promote to a normalized fragment.
    pub(crate) fn into_fragment(self) -> FragmentResult<SqlFragment> {
        match self {
            SqlInput::Text { sql, params } => SqlFragment::new(sql, params),
            SqlInput::Fragment(fragment) => Ok(fragment),
        }
    }

    /// Whether this input contributes nothing to a concatenation.
    fn is_empty(&self) -> bool {
        match self {
            SqlInput::Text { sql, .. } => sql.is_empty(),
            SqlInput::Fragment(fragment) => fragment.is_empty(),
        }
    }
}

impl From<&str> for SqlInput {
    fn from(sql: &str) -> Self {
        SqlInput::Text {
            sql: sql.to_string(),
            params: ParamMap::new(),
        }
    }
}

impl From<String> for SqlInput {
    fn from(sql: String) -> Self {
        SqlInput::Text {
            sql,
            params: ParamMap::new(),
        }
    }
}

impl<S: Into<String>, P: Into<ParamMap>> From<(S, P)> for SqlInput {
    fn from((sql, params): (S, P)) -> Self {
        SqlInput::Text {
            sql: sql.into(),
            params: params.into(),
        }
    }
}

impl From<SqlFragment> for SqlInput {
    fn from(fragment: SqlFragment) -> Self {
        SqlInput::Fragment(fragment)
    }
}

impl From<&SqlFragment> for SqlInput {
    fn from(fragment: &SqlFragment) -> Self {
        SqlInput::Fragment(fragment.clone())
    }
}

/// Concatenate SQL inputs with `glue`, merging their parameters without name
/// collisions.
///
/// Empty strings and empty fragments are dropped first: they contribute
/// neither text nor parameters. Raw non-empty text is promoted through full
/// fragment construction, so `join` fails exactly where construction would.
///
/// ```ignore
/// use sqlfrag::{join, ParamMap, SqlFragment};
///
/// let a = SqlFragment::new("a = :param1", ParamMap::from([("param1", 2)]))?;
/// let b = SqlFragment::new("a = :param1", ParamMap::from([("param1", 1)]))?;
/// let merged = join(" AND ", vec![a.into(), "b = 2".into(), b.into()])?;
/// assert_eq!(merged.text(), "a = :param1 AND b = 2 AND a = :param2");
/// ```
pub fn join(glue: &str, items: impl IntoIterator<Item = SqlInput>) -> FragmentResult<SqlFragment> {
    let mut fragments = Vec::new();
    for item in items {
        if item.is_empty() {
            continue;
        }
        fragments.push(item.into_fragment()?);
    }
    Ok(merge_sqls(fragments, glue))
}

/// Concatenate normalized fragments with `glue`, producing a new fragment.
///
/// When at most one fragment carries parameters no collision is possible, so
/// the texts are concatenated and the single parameter set reused as-is.
/// Renaming would only churn the names visible in debug output. With two or
/// more parameter sets in play, fragments are folded left to right through
/// [`merge_params`].
pub(crate) fn merge_sqls(fragments: Vec<SqlFragment>, glue: &str) -> SqlFragment {
    if fragments.is_empty() {
        return SqlFragment::empty();
    }

    let carrying = fragments.iter().filter(|f| !f.params().is_empty()).count();
    if carrying <= 1 {
        let params = fragments
            .iter()
            .find(|f| !f.params().is_empty())
            .map(|f| f.params().clone())
            .unwrap_or_default();
        let text = fragments
            .iter()
            .map(SqlFragment::text)
            .collect::<Vec<_>>()
            .join(glue);
        return SqlFragment::from_normalized(text, params);
    }

    let mut acc = ParamMap::new();
    let mut texts = Vec::with_capacity(fragments.len());
    for fragment in &fragments {
        texts.push(merge_params(fragment.text(), fragment.params(), &mut acc));
    }
    SqlFragment::from_normalized(texts.join(glue), acc)
}

/// Merge one fragment's `(text, params)` into an accumulated parameter set,
/// renaming placeholders that would collide.
///
/// Placeholders are visited in first-occurrence order. A name already present
/// in the accumulator gets the smallest free `paramK` name instead, and only
/// that occurrence in `text` is rewritten; everything else passes through
/// unchanged. Returns the possibly-rewritten text.
pub(crate) fn merge_params(text: &str, local: &ParamMap, acc: &mut ParamMap) -> String {
    let placeholders = scan_placeholders(text);
    if placeholders.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for ph in placeholders {
        out.push_str(&text[cursor..ph.start]);
        let value = match local.get(&ph.name) {
            Some(value) => value.clone(),
            // Normalized fragments bind every placeholder; leave anything
            // else untouched.
            None => {
                out.push_str(&text[ph.start..ph.end]);
                cursor = ph.end;
                continue;
            }
        };
        if acc.contains_key(&ph.name) {
            let fresh = next_free_name(acc);
            tracing::debug!(
                target: "sqlfrag",
                from = %ph.name,
                to = %fresh,
                "renamed colliding placeholder"
            );
            out.push(':');
            out.push_str(&fresh);
            acc.insert(fresh, value);
        } else {
            out.push_str(&text[ph.start..ph.end]);
            acc.insert(ph.name.clone(), value);
        }
        cursor = ph.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Smallest `paramK` (K >= 1) not yet present in the accumulator.
fn next_free_name(acc: &ParamMap) -> String {
    let mut k = 1usize;
    loop {
        let candidate = format!("param{k}");
        if !acc.contains_key(&candidate) {
            return candidate;
        }
        k += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn frag(text: &str, params: ParamMap) -> SqlFragment {
        SqlFragment::new(text, params).unwrap()
    }

    #[test]
    fn join_of_nothing_is_empty() {
        let merged = join(" AND ", Vec::new()).unwrap();
        assert_eq!(merged, SqlFragment::empty());
    }

    #[test]
    fn join_drops_absorbing_elements() {
        let a = frag("a = :a", ParamMap::from([("a", 1)]));
        let merged = join(
            " AND ",
            vec![SqlFragment::empty().into(), "".into(), (&a).into()],
        )
        .unwrap();
        assert_eq!(merged, a);
    }

    #[test]
    fn join_promotes_raw_text() {
        let merged = join(", ", vec!["a".into(), "b".into()]).unwrap();
        assert_eq!(merged.text(), "a, b");
        assert!(merged.params().is_empty());
    }

    #[test]
    fn join_propagates_promotion_errors() {
        assert!(join(" ", vec!["a = $1".into()]).is_err());
        assert!(join(" ", vec!["a = :a".into()]).is_err());
    }

    #[test]
    fn fast_path_keeps_single_param_set_unrenamed() {
        let a = frag("a = :status", ParamMap::from([("status", "active")]));
        let merged = join(" AND ", vec!["b = 1".into(), a.into(), "c = 2".into()]).unwrap();
        assert_eq!(merged.text(), "b = 1 AND a = :status AND c = 2");
        assert_eq!(
            merged.params().get("status"),
            Some(&Value::Text("active".to_string()))
        );
    }

    #[test]
    fn colliding_names_are_renamed_not_overwritten() {
        let a = frag("a = :param1", ParamMap::from([("param1", 2)]));
        let b = frag("a = :param1", ParamMap::from([("param1", 1)]));
        let merged = join(" AND ", vec![a.into(), "b = 2".into(), b.into()]).unwrap();
        assert_eq!(merged.text(), "a = :param1 AND b = 2 AND a = :param2");
        assert_eq!(merged.params().get("param1"), Some(&Value::Int(2)));
        assert_eq!(merged.params().get("param2"), Some(&Value::Int(1)));
    }

    #[test]
    fn distinct_names_merge_without_renaming() {
        let a = frag("a = :a", ParamMap::from([("a", 1)]));
        let b = frag("b = :b", ParamMap::from([("b", 2)]));
        let merged = join(" AND ", vec![a.into(), b.into()]).unwrap();
        assert_eq!(merged.text(), "a = :a AND b = :b");
        assert_eq!(merged.params().len(), 2);
    }

    #[test]
    fn rename_probes_past_taken_names() {
        let a = frag(
            "a = :param1 AND b = :param2",
            ParamMap::from([("param1", 1), ("param2", 2)]),
        );
        let b = frag("c = :param1", ParamMap::from([("param1", 3)]));
        let merged = join(" AND ", vec![a.into(), b.into()]).unwrap();
        assert_eq!(
            merged.text(),
            "a = :param1 AND b = :param2 AND c = :param3"
        );
        assert_eq!(merged.params().get("param3"), Some(&Value::Int(3)));
    }

    #[test]
    fn merged_result_is_still_normalizable() {
        let a = frag("a = :x", ParamMap::from([("x", 1)]));
        let b = frag("b = :x", ParamMap::from([("x", 2)]));
        let merged = join(" OR ", vec![a.into(), b.into()]).unwrap();
        let again = SqlFragment::new(merged.text(), merged.params().clone()).unwrap();
        assert_eq!(merged, again);
    }

    #[test]
    fn text_with_params_input_is_promoted() {
        let merged = join(
            " AND ",
            vec![
                ("a = :a", ParamMap::from([("a", 1)])).into(),
                ("b = :b", ParamMap::from([("b", 2)])).into(),
            ],
        )
        .unwrap();
        assert_eq!(merged.text(), "a = :a AND b = :b");
    }
}
