//! Account parsing.
//!
//! Accounts come from a single environment variable holding one block per
//! account, blocks separated by blank lines:
//!
//! ```text
//! user=main
//! kps=xxx
//! sign=yyy
//! vcode=zzz
//!
//! user=backup
//! url=https://drive-m.quark.cn/1/clouddrive/capacity/growth/info?kps=...&sign=...&vcode=...
//! cookie=__pus=abc; kps=...&sign=...&vcode=...
//! ```
//!
//! Credential slots are filled in a fixed order and never overwritten once
//! set: explicit `kps=`/`sign=`/`vcode=` lines first, then the `url` query
//! string, then a credential tail glued onto the `cookie` value.

use std::borrow::Cow;

use crate::error::{CheckinError, Result};

/// Keys that authorize the growth calls.
pub const CREDENTIAL_KEYS: [&str; 3] = ["kps", "sign", "vcode"];

/// One account as configured by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountParam {
    /// Display label; synthesized as `账号<N>` when not configured.
    pub user: String,
    pub url: Option<String>,
    /// Cookie header value, with any credential tail removed.
    pub cookie: Option<String>,
    pub kps: Option<String>,
    pub sign: Option<String>,
    pub vcode: Option<String>,
}

/// Validated credentials, all non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub kps: String,
    pub sign: String,
    pub vcode: String,
}

impl AccountParam {
    /// Returns the credentials, or a validation error naming every missing key.
    pub fn credentials(&self) -> Result<Credentials> {
        let missing: Vec<&'static str> = CREDENTIAL_KEYS
            .into_iter()
            .filter(|key| self.credential(key).is_none_or(str::is_empty))
            .collect();

        if !missing.is_empty() {
            return Err(CheckinError::Validation(missing));
        }

        Ok(Credentials {
            kps: self.kps.clone().unwrap_or_default(),
            sign: self.sign.clone().unwrap_or_default(),
            vcode: self.vcode.clone().unwrap_or_default(),
        })
    }

    fn credential(&self, key: &str) -> Option<&str> {
        match key {
            "kps" => self.kps.as_deref(),
            "sign" => self.sign.as_deref(),
            "vcode" => self.vcode.as_deref(),
            _ => None,
        }
    }

    fn credential_slot(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key {
            "kps" => Some(&mut self.kps),
            "sign" => Some(&mut self.sign),
            "vcode" => Some(&mut self.vcode),
            _ => None,
        }
    }

    /// Sets a credential only if the slot is still empty.
    fn fill_missing(&mut self, key: &str, value: String) {
        if value.is_empty() {
            return;
        }
        if let Some(slot) = self.credential_slot(key) {
            if slot.is_none() {
                *slot = Some(value);
            }
        }
    }
}

/// Parses the raw environment value into accounts.
///
/// Never fails: lines without `=` are dropped, and an absent or blank input
/// yields an empty list.
pub fn parse_accounts(raw: Option<&str>) -> Vec<AccountParam> {
    let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
        log::warn!("Account variable is missing or blank, no accounts parsed");
        return Vec::new();
    };

    if uses_legacy_separator(raw) {
        log::warn!(
            "Account variable contains `&&`; the `&&`-joined single-line format is not supported, separate accounts with a blank line and put one key=value per line"
        );
    }

    let accounts: Vec<AccountParam> = split_blocks(raw)
        .iter()
        .enumerate()
        .map(|(index, block)| parse_block(block, index + 1))
        .collect();

    log::info!("Parsed accounts count={}", accounts.len());
    accounts
}

/// True when a line looks like the old `kps=..; sign=..&&kps=..` layout.
fn uses_legacy_separator(raw: &str) -> bool {
    raw.lines().any(|line| line.contains("&&"))
}

/// Groups non-blank lines into blocks separated by blank lines.
fn split_blocks(raw: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    // `lines` already drops the `\r` of CRLF endings; `trim` handles the rest.
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

fn parse_block(lines: &[&str], position: usize) -> AccountParam {
    let mut param = AccountParam::default();

    for line in lines {
        let Some((key, value)) = split_pair(line) else {
            continue;
        };
        let value = (!value.is_empty()).then(|| value.to_string());

        match key {
            "user" => param.user = value.unwrap_or_default(),
            "url" => param.url = value,
            "cookie" => param.cookie = value,
            "kps" => param.kps = value,
            "sign" => param.sign = value,
            "vcode" => param.vcode = value,
            other => log::debug!("Ignoring unknown account key key={}", other),
        }
    }

    if let Some(url) = param.url.clone() {
        for (key, value) in query_pairs(&url) {
            param.fill_missing(key, value);
        }
    }

    if let Some(cookie) = param.cookie.take() {
        let (prefix, tail) = split_cookie_tail(&cookie);
        if let Some(tail) = tail {
            for (key, value) in tail_pairs(tail) {
                param.fill_missing(key, value);
            }
        }
        param.cookie = (!prefix.is_empty()).then(|| prefix.to_string());
    }

    if param.user.is_empty() {
        param.user = format!("账号{position}");
    }

    param
}

/// Trims whitespace and trailing semicolons.
fn clean(text: &str) -> &str {
    text.trim().trim_end_matches(';').trim_end()
}

fn split_pair(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = clean(key);
    if key.is_empty() {
        return None;
    }
    Some((key, clean(value)))
}

/// Splits `a=1; b=2; kps=K&sign=S` into (`a=1; b=2`, `kps=K&sign=S`).
///
/// The cut happens at the first `;` whose next segment starts with a
/// credential key.
fn split_cookie_tail(cookie: &str) -> (&str, Option<&str>) {
    for (index, _) in cookie.match_indices(';') {
        let rest = cookie[index + 1..].trim_start();
        let starts_with_credential = CREDENTIAL_KEYS.iter().any(|key| {
            rest.strip_prefix(key)
                .is_some_and(|after| after.starts_with('='))
        });
        if starts_with_credential {
            return (clean(&cookie[..index]), Some(rest));
        }
    }
    (clean(cookie), None)
}

fn tail_pairs(tail: &str) -> impl Iterator<Item = (&str, String)> {
    tail.split(['&', ';'])
        .filter_map(split_pair)
        .map(|(key, value)| (key, decode(value)))
}

fn query_pairs(url: &str) -> Vec<(&str, String)> {
    let Some((_, query)) = url.split_once('?') else {
        return Vec::new();
    };
    let query = query.split('#').next().unwrap_or_default();

    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.trim(), decode(value.trim())))
        .collect()
}

/// Percent-decodes a value, keeping `+` as is since tokens are base64-like.
fn decode(value: &str) -> String {
    urlencoding::decode(value)
        .unwrap_or(Cow::Borrowed(value))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(raw: &str) -> AccountParam {
        let mut accounts = parse_accounts(Some(raw));
        assert_eq!(accounts.len(), 1);
        accounts.remove(0)
    }

    #[test]
    fn test_two_blocks_in_order() {
        let accounts =
            parse_accounts(Some("user=A\nkps=1\nsign=2\nvcode=3\n\nuser=B\nkps=4\nsign=5\nvcode=6"));

        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].user, "A");
        assert_eq!(accounts[0].kps.as_deref(), Some("1"));
        assert_eq!(accounts[1].user, "B");
        assert_eq!(accounts[1].vcode.as_deref(), Some("6"));
    }

    #[test]
    fn test_cookie_tail_is_split_off() {
        let account = single("cookie=abc=1; kps=K&sign=S&vcode=V");

        assert_eq!(account.cookie.as_deref(), Some("abc=1"));
        assert_eq!(account.kps.as_deref(), Some("K"));
        assert_eq!(account.sign.as_deref(), Some("S"));
        assert_eq!(account.vcode.as_deref(), Some("V"));
    }

    #[test]
    fn test_cookie_with_several_pairs_keeps_prefix() {
        let account = single("cookie=a=1; b=2;kps=K&sign=S&vcode=V");
        assert_eq!(account.cookie.as_deref(), Some("a=1; b=2"));
        assert_eq!(account.kps.as_deref(), Some("K"));
    }

    #[test]
    fn test_plain_cookie_is_untouched() {
        let account = single("cookie=a=1; b=2;\nkps=K");
        assert_eq!(account.cookie.as_deref(), Some("a=1; b=2"));
        assert_eq!(account.sign, None);
    }

    #[test]
    fn test_url_query_fills_credentials() {
        let account = single("url=https://x?kps=K&sign=S&vcode=V");

        assert_eq!(account.url.as_deref(), Some("https://x?kps=K&sign=S&vcode=V"));
        assert_eq!(account.kps.as_deref(), Some("K"));
        assert_eq!(account.sign.as_deref(), Some("S"));
        assert_eq!(account.vcode.as_deref(), Some("V"));
    }

    #[test]
    fn test_url_values_are_percent_decoded_but_plus_is_kept() {
        let account = single("url=https://x?kps=a%2Fb+c%3D%3D&sign=S&vcode=V#frag");
        assert_eq!(account.kps.as_deref(), Some("a/b+c=="));
        assert_eq!(account.vcode.as_deref(), Some("V"));
    }

    #[test]
    fn test_explicit_beats_url_beats_cookie_tail() {
        let account = single(
            "kps=EXPLICIT\nurl=https://x?kps=URL&sign=URL\ncookie=c=1; kps=TAIL&sign=TAIL&vcode=TAIL",
        );

        assert_eq!(account.kps.as_deref(), Some("EXPLICIT"));
        assert_eq!(account.sign.as_deref(), Some("URL"));
        assert_eq!(account.vcode.as_deref(), Some("TAIL"));
        assert_eq!(account.cookie.as_deref(), Some("c=1"));
    }

    #[test]
    fn test_line_order_does_not_change_precedence() {
        let account = single("cookie=c=1; kps=TAIL\nkps=EXPLICIT");
        assert_eq!(account.kps.as_deref(), Some("EXPLICIT"));
    }

    #[test]
    fn test_synthetic_user_labels_follow_position() {
        let accounts = parse_accounts(Some("kps=1\n\nuser=named\nkps=2\n\nkps=3"));

        let users: Vec<&str> = accounts.iter().map(|a| a.user.as_str()).collect();
        assert_eq!(users, vec!["账号1", "named", "账号3"]);
    }

    #[test]
    fn test_crlf_and_whitespace_only_separators() {
        let accounts = parse_accounts(Some("user=A\r\nkps=1\r\n  \t \r\n\r\nuser=B\r\nkps=2\r\n"));

        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].kps.as_deref(), Some("1"));
        assert_eq!(accounts[1].user, "B");
    }

    #[test]
    fn test_trims_whitespace_and_trailing_semicolons() {
        let account = single("  user = A ;\n kps = K;; \nsign=S;");
        assert_eq!(account.user, "A");
        assert_eq!(account.kps.as_deref(), Some("K"));
        assert_eq!(account.sign.as_deref(), Some("S"));
    }

    #[test]
    fn test_lines_without_equals_are_skipped() {
        let account = single("just some text\nkps=K\n=orphan");
        assert_eq!(account.kps.as_deref(), Some("K"));
        assert_eq!(account.user, "账号1");
    }

    #[test]
    fn test_value_may_contain_equals() {
        let account = single("kps=abc==");
        assert_eq!(account.kps.as_deref(), Some("abc=="));
    }

    #[test]
    fn test_legacy_separator_is_detected_but_not_split() {
        let raw = "kps=K1; sign=S1; vcode=V1&&kps=K2; sign=S2; vcode=V2";
        assert!(uses_legacy_separator(raw));

        let accounts = parse_accounts(Some(raw));
        assert_eq!(accounts.len(), 1);
        assert!(accounts[0].sign.is_none());
    }

    #[test]
    fn test_blank_line_format_is_not_flagged_as_legacy() {
        assert!(!uses_legacy_separator("user=A\nurl=https://x?kps=K&sign=S&vcode=V"));
    }

    #[test]
    fn test_absent_or_blank_input_is_empty() {
        assert!(parse_accounts(None).is_empty());
        assert!(parse_accounts(Some("  \n \r\n")).is_empty());
    }

    #[test]
    fn test_credentials_reports_every_missing_key() {
        let account = single("kps=K\nsign=");
        match account.credentials() {
            Err(CheckinError::Validation(missing)) => assert_eq!(missing, vec!["sign", "vcode"]),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_credentials_when_complete() {
        let account = single("kps=K\nsign=S\nvcode=V");
        let credentials = account.credentials().unwrap();
        assert_eq!(credentials.kps, "K");
        assert_eq!(credentials.sign, "S");
        assert_eq!(credentials.vcode, "V");
    }
}
