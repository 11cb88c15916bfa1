//! Topic wildcard matching for the pub/sub transport (spec §4.3: topics
//! follow `pdsno/<category>/<region>/<sender>`; subscriptions may use
//! single-level (`+`) and multi-level (`#`) wildcards). Grounded on
//! `shared-bus::subscriber`'s `EventFilter` matching, generalized from the
//! teacher's fixed `subsystem.<id>.<channel>` shape.

/// Returns `true` if `topic` matches `pattern`, where `pattern` may contain
/// `+` (matches exactly one segment) and `#` (matches the rest of the
/// topic, must be the final segment).
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let pattern_segs: Vec<&str> = pattern.split('/').collect();
    let topic_segs: Vec<&str> = topic.split('/').collect();

    let mut pi = 0;
    let mut ti = 0;
    while pi < pattern_segs.len() {
        match pattern_segs[pi] {
            "#" => return true, // matches everything remaining; must be last token
            "+" => {
                if ti >= topic_segs.len() {
                    return false;
                }
            }
            seg => {
                if ti >= topic_segs.len() || topic_segs[ti] != seg {
                    return false;
                }
            }
        }
        pi += 1;
        ti += 1;
    }
    ti == topic_segs.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        assert!(topic_matches(
            "pdsno/discovery/zone-a/lc1",
            "pdsno/discovery/zone-a/lc1"
        ));
    }

    #[test]
    fn single_level_wildcard() {
        assert!(topic_matches("pdsno/discovery/+/lc1", "pdsno/discovery/zone-a/lc1"));
        assert!(!topic_matches(
            "pdsno/discovery/+/lc1",
            "pdsno/discovery/zone-a/zone-b/lc1"
        ));
    }

    #[test]
    fn multi_level_wildcard() {
        assert!(topic_matches("pdsno/discovery/#", "pdsno/discovery/zone-a/lc1"));
        assert!(topic_matches("pdsno/discovery/#", "pdsno/discovery"));
    }

    #[test]
    fn regional_wildcard_subscription() {
        assert!(topic_matches("pdsno/discovery/zone-a/+", "pdsno/discovery/zone-a/lc1"));
        assert!(!topic_matches("pdsno/discovery/zone-a/+", "pdsno/discovery/zone-b/lc1"));
    }
}
