use std::cmp::Ordering;

/// A package version number such as `1.2.10`, `5.4.2117` or `1.0.0-rc1`.
///
/// Segments are split on `.`; numeric segments compare numerically and
/// missing trailing segments count as zero, so `1.0 == 1.0.0`. Anything after
/// the first `-` is a pre-release tag and ranks below the untagged release.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct VersionNumber(String);

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Segment {
    Text(String),
    Numeric(u64),
}

impl VersionNumber {
    pub fn new(v: &str) -> Self {
        VersionNumber(v.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn segments(s: &str) -> Vec<Segment> {
        s.split('.')
            .filter(|part| !part.is_empty())
            .map(|part| match part.parse::<u64>() {
                Ok(n) => Segment::Numeric(n),
                Err(_) => Segment::Text(part.to_string()),
            })
            .collect()
    }

    fn compare_segments(a: &[Segment], b: &[Segment]) -> Ordering {
        let zero = Segment::Numeric(0);
        for i in 0..a.len().max(b.len()) {
            let ord = a.get(i).unwrap_or(&zero).cmp(b.get(i).unwrap_or(&zero));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl Ord for VersionNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a_base, a_tag) = match self.0.split_once('-') {
            Some((b, t)) => (b, Some(t)),
            None => (self.0.as_str(), None),
        };
        let (b_base, b_tag) = match other.0.split_once('-') {
            Some((b, t)) => (b, Some(t)),
            None => (other.0.as_str(), None),
        };

        match Self::compare_segments(&Self::segments(a_base), &Self::segments(b_base)) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match (a_tag, b_tag) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(at), Some(bt)) => {
                Self::compare_segments(&Self::segments(at), &Self::segments(bt))
            }
        }
    }
}

impl PartialOrd for VersionNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn compare_versions(a: &str, b: &str) -> Ordering {
    VersionNumber::new(a).cmp(&VersionNumber::new(b))
}
