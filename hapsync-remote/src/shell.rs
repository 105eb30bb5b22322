//! POSIX shell quoting for commands sent to the remote host.

/// Quote `arg` so the remote shell sees it as one literal word.
///
/// Words made only of safe characters are returned unchanged.
pub fn quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if safe {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Render `program args...` as a single remote command line.
pub fn join_argv(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .map(quote)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_words_are_untouched() {
        assert_eq!(quote("/etc/haproxy/conf.d"), "/etc/haproxy/conf.d");
        assert_eq!(quote("-p"), "-p");
    }

    #[test]
    fn unsafe_words_are_single_quoted() {
        assert_eq!(quote("a b"), "'a b'");
        assert_eq!(quote(""), "''");
        assert_eq!(quote("it's"), r"'it'\''s'");
        assert_eq!(quote("$(reboot)"), "'$(reboot)'");
    }

    #[test]
    fn argv_is_joined_with_quoting() {
        assert_eq!(
            join_argv("sha256sum", &["/srv/my file.cfg"]),
            "sha256sum '/srv/my file.cfg'"
        );
    }
}
