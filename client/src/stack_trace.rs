//! Trims test-framework and reflection frames from Java stack traces.

/// Frame prefixes that carry no information about the test itself.
const FILTERED_FRAMES: &[&str] = &[
    "junit.framework.TestCase",
    "junit.framework.TestResult",
    "junit.framework.TestResult$1",
    "junit.framework.TestSuite",
    "junit.framework.Assert",
    "org.junit.",
    "org.testng.internal.",
    "org.testng.TestRunner",
    "org.testng.SuiteRunner",
    "org.testng.TestNG",
    "org.testng.Assert",
    "java.lang.reflect.Method.invoke",
    "sun.reflect.",
    "jdk.internal.reflect.",
    "jdk.proxy",
    "org.gradle.api.internal.tasks.testing.",
    "org.gradle.internal.dispatch.",
    "org.gradle.process.internal.",
    "worker.org.gradle.process.internal.",
];

/// Drop `at ...` lines whose frame starts with a filtered prefix.
///
/// Exception headers, `Caused by:` and `... N more` lines are kept. A
/// leading module name (`java.base/`) is ignored when matching.
#[must_use]
pub fn filter_stack_trace(trace: &str) -> String {
    trace
        .lines()
        .filter(|line| !is_filtered_frame(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_filtered_frame(line: &str) -> bool {
    let Some(frame) = line.trim_start().strip_prefix("at ") else {
        return false;
    };
    // `java.base/jdk.internal...` carries a module name before the class.
    let frame = frame
        .split_once('/')
        .filter(|(module, _)| !module.contains('('))
        .map_or(frame, |(_, class)| class);
    FILTERED_FRAMES
        .iter()
        .any(|prefix| frame.starts_with(prefix))
}
