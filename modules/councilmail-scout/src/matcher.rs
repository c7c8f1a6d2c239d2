//! Picks the candidate address that best fits a person's name.
//!
//! A candidate "matches" when its local-part contains the first or last
//! name. Among matches the smallest Levenshtein distance between the full
//! lower-cased name and the local-part wins. Candidates arrive in a
//! `BTreeSet`, so equal distances resolve to the lexicographically first.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use councilmail_common::{NoMatchPolicy, Outcome};

static FIRST_NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z]+").unwrap());
static LAST_NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z]+$").unwrap());

/// Lower-cased text before the first `@`; the whole string if there is none.
pub fn local_part(email: &str) -> String {
    email
        .split_once('@')
        .map_or(email, |(local, _)| local)
        .to_lowercase()
}

/// Leading and trailing alphabetic runs of an already lower-cased name.
fn name_probes(name: &str) -> Vec<&str> {
    [FIRST_NAME_RE.find(name), LAST_NAME_RE.find(name)]
        .into_iter()
        .flatten()
        .map(|m| m.as_str())
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Scored<'a> {
    email: &'a str,
    distance: usize,
}

fn keep_closer<'a>(best: &mut Option<Scored<'a>>, candidate: Scored<'a>) {
    match best {
        Some(current) if current.distance <= candidate.distance => {}
        _ => *best = Some(candidate),
    }
}

/// Score `candidates` against `name` and classify the result.
pub fn best_match(name: &str, candidates: &BTreeSet<String>, policy: NoMatchPolicy) -> Outcome {
    let name = name.trim().to_lowercase();
    let probes = name_probes(&name);

    let mut best_matching: Option<Scored> = None;
    let mut closest: Option<Scored> = None;

    for email in candidates {
        let local = local_part(email);
        let scored = Scored {
            email,
            distance: strsim::levenshtein(&name, &local),
        };

        if probes.iter().any(|probe| local.contains(probe)) {
            keep_closer(&mut best_matching, scored);
        }
        keep_closer(&mut closest, scored);
    }

    match (best_matching, closest, policy) {
        (Some(best), _, _) => Outcome::Email(best.email.to_string()),
        (None, Some(closest), NoMatchPolicy::Surface) => {
            Outcome::NoMatchingEmail(closest.email.to_string())
        }
        _ => Outcome::NoEmailFound,
    }
}
