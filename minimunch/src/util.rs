use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Non-empty segments of a `/`-separated store path.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Whether a change at one path can alter the value seen at the other.
pub fn overlaps(a: &str, b: &str) -> bool {
    segments(a).zip(segments(b)).all(|(x, y)| x == y)
}

pub fn join_path(base: &str, child: &str) -> String {
    segments(base).chain(segments(child)).collect::<Vec<_>>().join("/")
}

pub fn random_suffix(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_paths() {
        assert!(overlaps("dispensador", "dispensador/status"));
        assert!(overlaps("dispensador/status", "dispensador"));
        assert!(overlaps("/dispensador/", "dispensador"));
        assert!(overlaps("", "dispensador"));
        assert!(!overlaps("dispensador/status", "dispensador/porpeso"));
        assert!(!overlaps("otro", "dispensador"));
    }

    #[test]
    fn joined_paths_are_normalized() {
        assert_eq!(join_path("dispensador/", "/status"), "dispensador/status");
        assert_eq!(join_path("", "status"), "status");
    }

    #[test]
    fn suffix_is_alphanumeric() {
        let s = random_suffix(12);
        assert_eq!(s.len(), 12);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
