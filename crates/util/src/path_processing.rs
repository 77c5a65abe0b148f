use std::path::PathBuf;

use dirs_next::home_dir;

/// Expand a leading `~` to the home directory. Other paths are returned trimmed.
pub fn expand_home(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix('~') else {
        return PathBuf::from(trimmed);
    };
    let Some(home) = home_dir() else {
        return PathBuf::from(trimmed);
    };
    match rest.strip_prefix(['/', '\\']) {
        Some(relative) => home.join(relative),
        None if rest.is_empty() => home,
        // `~user` forms are left alone
        None => PathBuf::from(trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_are_trimmed() {
        assert_eq!(expand_home("  suites/users.yaml "), PathBuf::from("suites/users.yaml"));
    }

    #[test]
    fn home_prefix_expands() {
        let Some(home) = home_dir() else { return };
        assert_eq!(expand_home("~"), home);
        assert_eq!(expand_home("~/apirig/suite.yaml"), home.join("apirig/suite.yaml"));
    }

    #[test]
    fn other_user_form_is_untouched() {
        assert_eq!(expand_home("~other/x"), PathBuf::from("~other/x"));
    }
}
