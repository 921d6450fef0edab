//! The SQL fragment value type.
//!
//! A [`SqlFragment`] pairs a piece of SQL text with the named parameters the
//! text references, and keeps the pair consistent through every operation:
//! each `:name` placeholder binds exactly one parameter, every parameter is
//! referenced exactly once, and positional `?` input is rewritten to named
//! form at construction time.
//!
//! # Example
//!
//! ```ignore
//! use sqlfrag::{SqlFragment, ParamMap};
//!
//! let mut q = SqlFragment::new(
//!     "SELECT id FROM users WHERE /* filter */ ORDER BY id",
//!     ParamMap::new(),
//! )?;
//! q.replace_comment("filter", ("status = :status", ParamMap::from([("status", "active")])))?;
//! assert_eq!(q.text(), "SELECT id FROM users WHERE status = :status ORDER BY id");
//! ```

use std::fmt;
use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::compose::{SqlInput, merge_params, merge_sqls};
use crate::error::{FragmentError, FragmentResult};
use crate::params::ParamMap;

/// Placeholder style tag carried by every fragment.
///
/// Fragments always bind by name once constructed (positional `?` input is
/// rewritten during normalization), so the tag is constant. It exists for
/// callers that probe fragments for compatibility before handing them to an
/// executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamStyle {
    Named,
}

impl ParamStyle {
    pub const fn as_str(self) -> &'static str {
        match self {
            ParamStyle::Named => "named",
        }
    }
}

impl fmt::Display for ParamStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named placeholder occurrence inside fragment text.
#[derive(Debug)]
pub(crate) struct Placeholder {
    pub name: String,
    /// Byte offset of the leading `:`.
    pub start: usize,
    /// Byte offset one past the last identifier character.
    pub end: usize,
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(:{1,2})([a-z][a-z0-9_]*)").expect("invalid built-in placeholder regex")
    })
}

fn brace_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("invalid built-in brace token regex")
    })
}

/// Scan `text` for `:name` placeholders in first-occurrence order.
///
/// A double-colon token (`::name`) is dialect cast syntax, not a placeholder,
/// and is skipped.
pub(crate) fn scan_placeholders(text: &str) -> Vec<Placeholder> {
    placeholder_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let colons = caps.get(1)?;
            let name = caps.get(2)?;
            if colons.as_str().len() != 1 {
                return None;
            }
            Some(Placeholder {
                name: name.as_str().to_string(),
                start: colons.start(),
                end: name.end(),
            })
        })
        .collect()
}

/// A parameterized piece of SQL: text plus the named values it references.
///
/// Fragments are value types with structural equality and no identity. All
/// mutation flows through the composing operations ([`wrap`](Self::wrap),
/// [`replace_comment`](Self::replace_comment)), each of which assigns a fully
/// re-normalized `(text, parameters)` pair; there is no observable
/// intermediate state and no way to set either field directly.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SqlFragment {
    text: String,
    params: ParamMap,
}

/// Normalize a raw `(text, params)` pair into a consistent fragment state.
///
/// Validates placeholder style, rewrites positional `?` marks to `:paramK`,
/// restricts the parameter set to exactly the referenced names in
/// first-occurrence order, and drops unreferenced extras.
fn normalize(text: String, supplied: ParamMap) -> FragmentResult<(String, ParamMap)> {
    if text.contains('$') {
        return Err(FragmentError::coding("dollar placeholders are not supported"));
    }

    let named = scan_placeholders(&text);
    let positional = text.matches('?').count();
    if !named.is_empty() && positional > 0 {
        return Err(FragmentError::MixedPlaceholders);
    }

    if !named.is_empty() {
        // Occurrences, not distinct names: a duplicate reference must first
        // show up as a count mismatch when too few values are supplied.
        if named.len() > supplied.len() {
            return Err(FragmentError::parameter_count(named.len(), supplied.len()));
        }
        let mut params = ParamMap::new();
        for ph in &named {
            let Some(value) = supplied.get(&ph.name) else {
                return Err(FragmentError::MissingParameter(ph.name.clone()));
            };
            if params.contains_key(&ph.name) {
                return Err(FragmentError::DuplicatePlaceholder(ph.name.clone()));
            }
            params.insert(ph.name.clone(), value.clone());
        }
        return Ok((text, params));
    }

    if positional > 0 {
        if positional > supplied.len() {
            return Err(FragmentError::parameter_count(positional, supplied.len()));
        }
        // Trailing extras beyond the placeholder count are dropped.
        let values: Vec<_> = supplied.into_iter().map(|(_, v)| v).take(positional).collect();
        let pieces: Vec<&str> = text.split('?').collect();
        let mut out = String::with_capacity(text.len() + positional * 8);
        let mut params = ParamMap::new();
        for (i, piece) in pieces.iter().enumerate() {
            out.push_str(piece);
            if i < positional {
                let name = format!("param{}", i + 1);
                let _ = write!(&mut out, ":{name}");
                params.insert(name, values[i].clone());
            }
        }
        return Ok((out, params));
    }

    // No placeholders: supplied parameters are ignored entirely.
    Ok((text, ParamMap::new()))
}

impl SqlFragment {
    /// Construct a fragment from SQL text and a candidate parameter set.
    ///
    /// The pair is normalized before the fragment exists: `$` placeholders
    /// and mixed `:name`/`?` styles are rejected, positional `?` marks are
    /// rewritten to `:param1..:paramK`, and the resulting parameter map holds
    /// exactly the referenced names in first-occurrence order. Supplied
    /// values that no placeholder references are silently dropped.
    pub fn new(text: impl Into<String>, params: impl Into<ParamMap>) -> FragmentResult<Self> {
        let (text, params) = normalize(text.into(), params.into())?;
        Ok(Self { text, params })
    }

    /// Create an empty fragment: no text, no parameters.
    ///
    /// The empty fragment means "no clause": [`wrap`](Self::wrap) leaves it
    /// untouched and [`join`](crate::compose::join) drops it entirely.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Construct a fragment with a JSON object as the parameter set.
    ///
    /// Entry values must be JSON scalars; booleans coerce to `0`/`1`.
    pub fn from_json(text: impl Into<String>, params: serde_json::Value) -> FragmentResult<Self> {
        Self::new(text, ParamMap::from_json(params)?)
    }

    /// Rebuild from parts that already satisfy the fragment invariants.
    ///
    /// Callers must only pass text/params pairs produced from normalized
    /// fragments (merge results); nothing is re-validated here.
    pub(crate) fn from_normalized(text: String, params: ParamMap) -> Self {
        Self { text, params }
    }

    /// The SQL text, containing only `:name`-style placeholders.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The bound parameters, in placeholder first-occurrence order.
    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    /// Whether this is the empty ("no clause") fragment.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The constant placeholder-style tag (always [`ParamStyle::Named`]).
    pub const fn param_style(&self) -> ParamStyle {
        ParamStyle::Named
    }

    /// Split the fragment into the `(text, parameters)` pair handed to a
    /// prepared-statement executor.
    pub fn into_parts(self) -> (String, ParamMap) {
        (self.text, self.params)
    }

    /// Probe a fragment property by name, for callers that feel around for
    /// optional metadata.
    ///
    /// Known keys are `"text"`, `"parameters"`, and `"style"`. An unknown key
    /// is not an error: it emits a `tracing` warning and returns `None`, so
    /// probing callers never crash.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        match key {
            "text" => Some(serde_json::Value::String(self.text.clone())),
            "parameters" => Some(self.params.to_json()),
            "style" => Some(serde_json::Value::String(
                self.param_style().as_str().to_string(),
            )),
            _ => {
                tracing::warn!(target: "sqlfrag", key, "unknown fragment property");
                None
            }
        }
    }

    /// Replace the unique `/* marker */` comment with another piece of SQL.
    ///
    /// The replacement may be raw text (with its own parameters) or an
    /// existing fragment. Its placeholders are hygienically renamed where
    /// they collide with this fragment's, the comment is substituted, and
    /// the whole result is re-normalized before being assigned in place.
    ///
    /// Fails if the comment occurs zero times or more than once: the
    /// substitution target must be unambiguous.
    pub fn replace_comment(
        &mut self,
        marker: &str,
        replacement: impl Into<SqlInput>,
    ) -> FragmentResult<&mut Self> {
        let comment = format!("/* {marker} */");
        match self.text.matches(comment.as_str()).count() {
            0 => return Err(FragmentError::coding(format!("comment not found: {comment}"))),
            1 => {}
            _ => {
                return Err(FragmentError::coding(format!(
                    "multiple comments found: {comment}"
                )));
            }
        }

        let replacement = replacement.into().into_fragment()?;
        let mut merged = self.params.clone();
        let rewritten = merge_params(replacement.text(), replacement.params(), &mut merged);

        let text = self.text.replacen(comment.as_str(), &rewritten, 1);
        let (text, params) = normalize(text, merged)?;
        self.text = text;
        self.params = params;
        Ok(self)
    }

    /// Surround the fragment's text with `prefix` and `suffix`.
    ///
    /// An empty fragment stays empty: wrapping "no clause" must not
    /// manufacture one (an empty `WHERE` body never becomes `"()"`).
    pub fn wrap(&mut self, prefix: &str, suffix: &str) -> FragmentResult<&mut Self> {
        if self.text.is_empty() {
            return Ok(self);
        }
        let parts = vec![
            SqlFragment::new(prefix, ParamMap::new())?,
            self.clone(),
            SqlFragment::new(suffix, ParamMap::new())?,
        ];
        let merged = merge_sqls(parts, "");
        self.text = merged.text;
        self.params = merged.params;
        Ok(self)
    }

    /// Render a copy-pasteable form of the query for an interactive console.
    ///
    /// Substitutes every `{identifier}` token with the double-quoted,
    /// prefix-qualified identifier and appends one `--name = value` comment
    /// line per parameter in map order. Values are rendered raw, with no
    /// quoting or escaping: this is a developer aid, never an execution path.
    pub fn export_debug_query(&self, prefix: &str) -> String {
        let mut out = brace_token_re()
            .replace_all(&self.text, |caps: &regex::Captures| {
                format!("\"{prefix}{}\"", &caps[1])
            })
            .into_owned();
        for (name, value) in self.params.iter() {
            let _ = write!(&mut out, "\n--{name} = {value}");
        }
        out
    }
}

impl fmt::Display for SqlFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for SqlFragment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("text", &self.text)?;
        map.serialize_entry("parameters", &self.params)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn named_construction_keeps_text_and_order() {
        let frag = SqlFragment::new(
            "a = :a AND b = :b",
            ParamMap::from([("b", 2), ("a", 1)]),
        )
        .unwrap();
        assert_eq!(frag.text(), "a = :a AND b = :b");
        let keys: Vec<&str> = frag.params().keys().collect();
        assert_eq!(keys, ["a", "b"]);
    }

    #[test]
    fn extra_supplied_params_are_dropped() {
        let frag =
            SqlFragment::new("a = :a", ParamMap::from([("a", 1), ("unused", 9)])).unwrap();
        assert_eq!(frag.params().len(), 1);
        assert!(!frag.params().contains_key("unused"));
    }

    #[test]
    fn no_placeholders_ignores_all_params() {
        let frag = SqlFragment::new("a = 1", ParamMap::from([("a", 1)])).unwrap();
        assert_eq!(frag.text(), "a = 1");
        assert!(frag.params().is_empty());
    }

    #[test]
    fn positional_marks_become_named() {
        let frag =
            SqlFragment::new("a = ? AND b = ?", ParamMap::from_values([10, 20])).unwrap();
        assert_eq!(frag.text(), "a = :param1 AND b = :param2");
        assert_eq!(frag.params().get("param1"), Some(&Value::Int(10)));
        assert_eq!(frag.params().get("param2"), Some(&Value::Int(20)));
    }

    #[test]
    fn excess_positional_values_are_truncated() {
        let frag = SqlFragment::new("a = ?", ParamMap::from_values([1, 2, 3])).unwrap();
        assert_eq!(frag.text(), "a = :param1");
        assert_eq!(frag.params().len(), 1);
    }

    #[test]
    fn too_few_positional_values_fail() {
        let err = SqlFragment::new("a = ? AND b = ?", ParamMap::from_values([1])).unwrap_err();
        assert!(matches!(
            err,
            FragmentError::ParameterCount { expected: 2, actual: 1 }
        ));
    }

    #[test]
    fn dollar_placeholders_are_rejected() {
        let err = SqlFragment::new("a = $1", ParamMap::new()).unwrap_err();
        assert!(err.is_coding());
    }

    #[test]
    fn mixed_styles_are_rejected() {
        let err = SqlFragment::new("a = :a AND b = ?", ParamMap::from([("a", 1)])).unwrap_err();
        assert!(err.is_mixed_placeholders());
    }

    #[test]
    fn missing_named_parameter_fails() {
        let err =
            SqlFragment::new("a = :a AND b = :b", ParamMap::from([("a", 1), ("c", 3)]))
                .unwrap_err();
        assert!(matches!(err, FragmentError::MissingParameter(name) if name == "b"));
    }

    #[test]
    fn duplicate_placeholder_fails() {
        let err = SqlFragment::new(
            "a = :a OR a2 = :a",
            ParamMap::from([("a", 1), ("b", 2)]),
        )
        .unwrap_err();
        assert!(matches!(err, FragmentError::DuplicatePlaceholder(name) if name == "a"));
    }

    #[test]
    fn duplicate_with_too_few_params_is_a_count_error() {
        // Two occurrences of :a against one supplied value: the count check
        // fires before duplicate detection.
        let err = SqlFragment::new("a = :a OR a2 = :a", ParamMap::from([("a", 1)])).unwrap_err();
        assert!(err.is_parameter_count());
    }

    #[test]
    fn double_colon_is_not_a_placeholder() {
        let frag = SqlFragment::new("a = b::int4", ParamMap::new()).unwrap();
        assert!(frag.params().is_empty());

        let frag =
            SqlFragment::new("a::text = :a", ParamMap::from([("a", "x")])).unwrap();
        let keys: Vec<&str> = frag.params().keys().collect();
        assert_eq!(keys, ["a"]);
    }

    #[test]
    fn uppercase_identifiers_are_not_placeholders() {
        let frag = SqlFragment::new("a = :A", ParamMap::new()).unwrap();
        assert!(frag.params().is_empty());
    }

    #[test]
    fn wrap_parenthesizes_non_empty() {
        let mut frag = SqlFragment::new("a = :param1", ParamMap::from([("param1", 2)])).unwrap();
        frag.wrap("(", ")").unwrap();
        assert_eq!(frag.text(), "(a = :param1)");
        assert_eq!(frag.params().get("param1"), Some(&Value::Int(2)));
    }

    #[test]
    fn wrap_is_a_noop_on_empty() {
        let mut frag = SqlFragment::empty();
        frag.wrap("(", ")").unwrap();
        assert_eq!(frag.text(), "");
        assert!(frag.params().is_empty());
    }

    #[test]
    fn wrap_with_empty_affixes_is_identity() {
        let mut frag = SqlFragment::new("a = :a", ParamMap::from([("a", 1)])).unwrap();
        let before = frag.clone();
        frag.wrap("", "").unwrap();
        assert_eq!(frag, before);
    }

    #[test]
    fn replace_comment_substitutes_unique_marker() {
        let mut frag = SqlFragment::new(
            "SELECT * FROM t WHERE /* cond */ ORDER BY id",
            ParamMap::new(),
        )
        .unwrap();
        frag.replace_comment("cond", ("a = :a", ParamMap::from([("a", 1)])))
            .unwrap();
        assert_eq!(frag.text(), "SELECT * FROM t WHERE a = :a ORDER BY id");
        assert_eq!(frag.params().get("a"), Some(&Value::Int(1)));
        assert!(!frag.text().contains("/* cond */"));
    }

    #[test]
    fn replace_comment_requires_exactly_one_marker() {
        let mut missing = SqlFragment::new("SELECT 1", ParamMap::new()).unwrap();
        let err = missing.replace_comment("cond", "a = 1").unwrap_err();
        assert!(err.to_string().contains("comment not found"));

        let mut twice =
            SqlFragment::new("/* cond */ OR /* cond */", ParamMap::new()).unwrap();
        let err = twice.replace_comment("cond", "a = 1").unwrap_err();
        assert!(err.to_string().contains("multiple comments found"));
    }

    #[test]
    fn replace_comment_renames_colliding_names() {
        let mut frag = SqlFragment::new(
            "a = :param1 AND /* more */",
            ParamMap::from([("param1", 1)]),
        )
        .unwrap();
        frag.replace_comment("more", ("b = :param1", ParamMap::from([("param1", 2)])))
            .unwrap();
        assert_eq!(frag.text(), "a = :param1 AND b = :param2");
        assert_eq!(frag.params().get("param1"), Some(&Value::Int(1)));
        assert_eq!(frag.params().get("param2"), Some(&Value::Int(2)));
    }

    #[test]
    fn replace_comment_accepts_fragments_and_chains() {
        let cond = SqlFragment::new("b = :b", ParamMap::from([("b", 5)])).unwrap();
        let mut frag = SqlFragment::new(
            "SELECT * FROM t WHERE /* one */ AND /* two */",
            ParamMap::new(),
        )
        .unwrap();
        frag.replace_comment("one", cond)
            .unwrap()
            .replace_comment("two", "c = 3")
            .unwrap();
        assert_eq!(frag.text(), "SELECT * FROM t WHERE b = :b AND c = 3");
    }

    #[test]
    fn probe_answers_known_keys_softly_fails_unknown() {
        let frag = SqlFragment::new("a = :a", ParamMap::from([("a", 1)])).unwrap();
        assert_eq!(
            frag.get("text"),
            Some(serde_json::Value::String("a = :a".to_string()))
        );
        assert_eq!(
            frag.get("style"),
            Some(serde_json::Value::String("named".to_string()))
        );
        assert!(frag.get("parameters").is_some());
        assert_eq!(frag.get("no_such_property"), None);
    }

    #[test]
    fn export_debug_query_qualifies_and_lists_params() {
        let frag = SqlFragment::new(
            "SELECT * FROM {users} WHERE name = :name AND age > :age",
            ParamMap::from([("name", Value::from("ann")), ("age", Value::from(30))]),
        )
        .unwrap();
        let out = frag.export_debug_query("app_");
        assert_eq!(
            out,
            "SELECT * FROM \"app_users\" WHERE name = :name AND age > :age\n--name = ann\n--age = 30"
        );
    }

    #[test]
    fn renormalizing_is_idempotent() {
        let frag = SqlFragment::new(
            "a = :a AND b = :b",
            ParamMap::from([("a", 1), ("b", 2)]),
        )
        .unwrap();
        let again = SqlFragment::new(frag.text(), frag.params().clone()).unwrap();
        assert_eq!(frag, again);
    }
}
