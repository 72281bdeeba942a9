//! Uri-Query helpers.
//!
//! A request's query options are joined with `&`, so a query
//! looks like `if=oic.if.baseline&rt=oic.r.light`.

/// Every `key=value` pair in a query, in order.
///
/// A pair without `=` yields an empty value; empty pairs are skipped.
pub fn pairs(query: &str) -> impl Iterator<Item = (&str, &str)> {
  query.split('&')
       .filter(|pair| !pair.is_empty())
       .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
}

/// The `n`th (starting at 0) key-value pair of a query
///
/// ```
/// use oic::req::query::nth_key_value;
///
/// let q = "if=oic.if.ll&rt=oic.r.switch";
/// assert_eq!(nth_key_value(q, 1), Some(("rt", "oic.r.switch")));
/// assert_eq!(nth_key_value(q, 2), None);
/// ```
pub fn nth_key_value(query: &str, n: usize) -> Option<(&str, &str)> {
  pairs(query).nth(n)
}

/// The value of the first pair whose key matches `key` (ignoring ASCII case)
///
/// ```
/// use oic::req::query::value;
///
/// assert_eq!(value("IF=oic.if.b&x", "if"), Some("oic.if.b"));
/// assert_eq!(value("IF=oic.if.b&x", "x"), Some(""));
/// assert_eq!(value("IF=oic.if.b&x", "rt"), None);
/// ```
pub fn value<'a>(query: &'a str, key: &str) -> Option<&'a str> {
  pairs(query).find(|(k, _)| k.eq_ignore_ascii_case(key))
              .map(|(_, v)| v)
}
