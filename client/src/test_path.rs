//! Flattening of test name chains into explorer paths.

use buildlink_types::TestName;

/// Root-to-leaf path segments identifying the test named by `leaf`.
///
/// Each node contributes its suite, method or class name (first present
/// wins). Leading entries that are only the outer-class prefix of the next
/// entry (`Outer` before `Outer$Inner`) are dropped so a nested class is
/// identified by its full binary name alone.
#[must_use]
pub fn resolve_test_path(leaf: &TestName) -> Vec<String> {
    let mut parts: Vec<&str> = leaf.ancestry().filter_map(TestName::segment).collect();
    parts.reverse();

    let redundant = parts
        .windows(2)
        .take_while(|pair| {
            pair[1]
                .strip_prefix(pair[0])
                .is_some_and(|rest| rest.starts_with('$'))
        })
        .count();

    parts[redundant..].iter().map(|s| (*s).to_string()).collect()
}
