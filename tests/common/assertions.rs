/// FFmpeg command assertion utilities
#[allow(dead_code)]
pub fn assert_cmd_contains(cmd: &str, flag: &str) {
    assert!(
        cmd.contains(flag),
        "Expected FFmpeg command to contain '{}' but it didn't.\nCommand: {}",
        flag,
        cmd
    );
}

/// Check if a command string does NOT contain a specific flag
#[allow(dead_code)]
pub fn assert_cmd_not_contains(cmd: &str, flag: &str) {
    assert!(
        !cmd.contains(flag),
        "Expected FFmpeg command to NOT contain '{}' but it did.\nCommand: {}",
        flag,
        cmd
    );
}

/// Check if a command contains a flag with a specific value
#[allow(dead_code)]
pub fn assert_cmd_has_flag_value(cmd: &str, flag: &str, value: &str) {
    let pattern = format!("{} {}", flag, value);
    assert!(
        cmd.contains(&pattern),
        "Expected FFmpeg command to contain '{} {}' but it didn't.\nCommand: {}",
        flag,
        value,
        cmd
    );
}

/// Parse a flag value from the command (e.g., get "23" from "-crf 23")
#[allow(dead_code)]
pub fn get_flag_value<'a>(cmd: &'a str, flag: &str) -> Option<&'a str> {
    let pattern = format!(" {} ", flag);
    cmd.find(&pattern).and_then(|pos| {
        let after_flag = &cmd[pos + pattern.len()..];
        after_flag.split_whitespace().next()
    })
}

/// `a` must appear before `b`
#[allow(dead_code)]
pub fn assert_flag_order(cmd: &str, a: &str, b: &str) {
    let pa = cmd.find(a);
    let pb = cmd.find(b);
    assert!(
        matches!((pa, pb), (Some(x), Some(y)) if x < y),
        "Expected '{}' before '{}'.\nCommand: {}",
        a,
        b,
        cmd
    );
}

/// At most one of the flags may appear
#[allow(dead_code)]
pub fn assert_mutually_exclusive(cmd: &str, flags: &[&str]) {
    let present: Vec<&&str> = flags.iter().filter(|f| cmd.contains(**f)).collect();
    assert!(
        present.len() <= 1,
        "Expected at most one of {:?} but found {:?}.\nCommand: {}",
        flags,
        present,
        cmd
    );
}
