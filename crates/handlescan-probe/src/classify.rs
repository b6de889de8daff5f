//! Detection rule evaluation.
//!
//! Classification is a pure function of the rule, the captured response and
//! the username: the same inputs always give the same verdict.

use crate::transport::CapturedResponse;
use handlescan_sites::{DetectionRule, USERNAME_TOKEN};
use thiserror::Error;

/// Outcome of evaluating a rule against a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The response matches a known-existing account
    Claimed,
    /// The response matches the site's "no such user" signal
    Available,
}

/// A rule that cannot be evaluated against the response it was given.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("message rule has no messages to match")]
    EmptyMessages,

    #[error("combination rule has no members")]
    EmptyCombination,

    #[error("{kind} rule needs a response body but none was captured")]
    MissingBody { kind: &'static str },
}

/// Evaluate `rule` against `response` for `username`.
pub fn classify(
    rule: &DetectionRule,
    response: &CapturedResponse,
    username: &str,
) -> Result<Verdict, RuleError> {
    match rule {
        DetectionRule::StatusCode { error_codes } => {
            if error_codes.contains(&response.status) || !response.is_success() {
                Ok(Verdict::Available)
            } else {
                Ok(Verdict::Claimed)
            }
        }

        DetectionRule::Message { error_messages } => {
            if error_messages.is_empty() {
                return Err(RuleError::EmptyMessages);
            }
            let body = response
                .body
                .as_deref()
                .ok_or(RuleError::MissingBody { kind: rule.kind() })?;

            if error_messages.iter().any(|msg| body.contains(msg.as_str())) {
                Ok(Verdict::Available)
            } else {
                Ok(Verdict::Claimed)
            }
        }

        DetectionRule::ResponseUrl { error_url } => {
            if let Some(error_url) = error_url {
                let error_url = error_url.replace(USERNAME_TOKEN, username);
                if response.final_url.starts_with(&error_url) {
                    return Ok(Verdict::Available);
                }
            }

            if response.is_success() {
                Ok(Verdict::Claimed)
            } else {
                Ok(Verdict::Available)
            }
        }

        DetectionRule::All(rules) => {
            if rules.is_empty() {
                return Err(RuleError::EmptyCombination);
            }
            for member in rules {
                if classify(member, response, username)? == Verdict::Available {
                    return Ok(Verdict::Available);
                }
            }
            Ok(Verdict::Claimed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(codes: &[u16]) -> DetectionRule {
        DetectionRule::StatusCode {
            error_codes: codes.to_vec(),
        }
    }

    fn message(msgs: &[&str]) -> DetectionRule {
        DetectionRule::Message {
            error_messages: msgs.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_status_code_rule() {
        let rule = status(&[]);
        assert_eq!(
            classify(&rule, &CapturedResponse::headers_only(200, "u"), "a"),
            Ok(Verdict::Claimed)
        );
        assert_eq!(
            classify(&rule, &CapturedResponse::headers_only(404, "u"), "a"),
            Ok(Verdict::Available)
        );
    }

    #[test]
    fn test_status_code_listed_2xx_is_available() {
        let rule = status(&[204]);
        assert_eq!(
            classify(&rule, &CapturedResponse::headers_only(204, "u"), "a"),
            Ok(Verdict::Available)
        );
    }

    #[test]
    fn test_message_rule() {
        let rule = message(&["User not found", "No such page"]);
        let missing = CapturedResponse::new(200, "u", "<h1>User not found</h1>");
        let present = CapturedResponse::new(200, "u", "<h1>alice</h1>");

        assert_eq!(classify(&rule, &missing, "alice"), Ok(Verdict::Available));
        assert_eq!(classify(&rule, &present, "alice"), Ok(Verdict::Claimed));
    }

    #[test]
    fn test_message_rule_errors() {
        let response = CapturedResponse::new(200, "u", "body");
        assert_eq!(
            classify(&message(&[]), &response, "a"),
            Err(RuleError::EmptyMessages)
        );
        assert_eq!(
            classify(&message(&["x"]), &CapturedResponse::headers_only(200, "u"), "a"),
            Err(RuleError::MissingBody { kind: "message" })
        );
    }

    #[test]
    fn test_response_url_with_error_url() {
        let rule = DetectionRule::ResponseUrl {
            error_url: Some("https://site.test/notfound?u={}".to_string()),
        };
        let redirected = CapturedResponse::new(200, "https://site.test/notfound?u=bob", "");
        let profile = CapturedResponse::new(200, "https://site.test/bob", "");

        assert_eq!(classify(&rule, &redirected, "bob"), Ok(Verdict::Available));
        assert_eq!(classify(&rule, &profile, "bob"), Ok(Verdict::Claimed));
    }

    #[test]
    fn test_response_url_without_error_url() {
        let rule = DetectionRule::ResponseUrl { error_url: None };
        assert_eq!(
            classify(&rule, &CapturedResponse::new(302, "u", ""), "a"),
            Ok(Verdict::Available)
        );
        assert_eq!(
            classify(&rule, &CapturedResponse::new(200, "u", ""), "a"),
            Ok(Verdict::Claimed)
        );
    }

    #[test]
    fn test_combination_requires_every_member() {
        let rule = DetectionRule::All(vec![status(&[]), message(&["gone"])]);

        let both_claimed = CapturedResponse::new(200, "u", "profile");
        let message_says_available = CapturedResponse::new(200, "u", "user is gone");
        let status_says_available = CapturedResponse::new(404, "u", "profile");

        assert_eq!(classify(&rule, &both_claimed, "a"), Ok(Verdict::Claimed));
        assert_eq!(classify(&rule, &message_says_available, "a"), Ok(Verdict::Available));
        assert_eq!(classify(&rule, &status_says_available, "a"), Ok(Verdict::Available));
        assert_eq!(
            classify(&DetectionRule::All(vec![]), &both_claimed, "a"),
            Err(RuleError::EmptyCombination)
        );
    }

    #[test]
    fn test_classification_is_repeatable() {
        let rule = message(&["nope"]);
        let response = CapturedResponse::new(200, "u", "nope");
        let first = classify(&rule, &response, "a");
        for _ in 0..10 {
            assert_eq!(classify(&rule, &response, "a"), first);
        }
    }
}
