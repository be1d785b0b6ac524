//! Receipt layout: turns a normalized profile into printable lines.
//!
//! The layout is renderer-agnostic. The server rasterizes it, but any
//! consumer can walk [`Receipt::sections`] and print label/value pairs.

use chrono::{DateTime, Utc};

use crate::github::GithubUser;
use crate::profile::Profile;
use crate::x::XUser;

/// One `LABEL: value` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLine {
    pub label: &'static str,
    pub value: String,
}

impl ReceiptLine {
    fn new(label: &'static str, value: impl Into<String>) -> Self {
        Self {
            label,
            value: value.into(),
        }
    }
}

/// A group of lines separated from its neighbours by a dashed rule.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Section {
    pub heading: Option<&'static str>,
    pub lines: Vec<ReceiptLine>,
}

/// A fully laid out receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub title: &'static str,
    pub date: String,
    pub order_number: String,
    pub sections: Vec<Section>,
    pub footer: &'static str,
    pub url: String,
}

impl Receipt {
    /// Lay out `profile` as a receipt issued at `issued_at`.
    pub fn from_profile(profile: &Profile, issued_at: DateTime<Utc>) -> Self {
        let date = issued_at.format("%A, %B %d, %Y").to_string();
        let order_number = order_number(profile.username(), issued_at);

        match profile {
            Profile::X(user) => Self {
                title: "X RECEIPT",
                date,
                order_number,
                sections: x_sections(user, issued_at),
                footer: "THANK YOU FOR POASTING!",
                url: user.profile_url(),
            },
            Profile::Github(user) => Self {
                title: "GITHUB RECEIPT",
                date,
                order_number,
                sections: github_sections(user),
                footer: "THANK YOU FOR CODING!",
                url: user.html_url.clone(),
            },
        }
    }

    /// Total number of printed lines, used to size the canvas.
    pub fn line_count(&self) -> usize {
        self.sections
            .iter()
            .map(|s| s.lines.len() + usize::from(s.heading.is_some()))
            .sum()
    }
}

fn x_sections(user: &XUser, issued_at: DateTime<Utc>) -> Vec<Section> {
    let metrics = &user.public_metrics;
    let created = parse_timestamp(&user.created_at);

    let mut sections = vec![
        Section {
            heading: None,
            lines: vec![
                ReceiptLine::new("CUSTOMER:", &user.name),
                ReceiptLine::new("@USERNAME:", &user.username),
                ReceiptLine::new(
                    "BIO:",
                    user.description
                        .clone()
                        .filter(|d| !d.is_empty())
                        .unwrap_or_else(|| "No bio".to_string()),
                ),
                ReceiptLine::new(
                    "LOCATION:",
                    user.location.clone().unwrap_or_else(|| "???".to_string()),
                ),
                ReceiptLine::new("WEBSITE:", user.profile_url()),
            ],
        },
        Section {
            heading: None,
            lines: vec![
                ReceiptLine::new("POSTS:", group_thousands(metrics.tweet_count)),
                ReceiptLine::new("FOLLOWERS:", group_thousands(metrics.followers_count)),
                ReceiptLine::new("FOLLOWING:", group_thousands(metrics.following_count)),
                ReceiptLine::new("LISTED:", group_thousands(metrics.listed_count)),
                ReceiptLine::new("LIKES:", group_thousands(metrics.like_count)),
            ],
        },
    ];

    let mut account = vec![
        ReceiptLine::new("VERIFIED:", user.verified_type.label()),
        ReceiptLine::new("MEMBER SINCE:", member_since(&user.created_at)),
    ];
    if let Some(years) = created.and_then(|c| issued_at.years_since(c)) {
        let unit = if years == 1 { "YEAR" } else { "YEARS" };
        account.push(ReceiptLine::new("ACCOUNT AGE:", format!("{years} {unit}")));
    }
    sections.push(Section {
        heading: None,
        lines: account,
    });

    if let Some(pinned) = &user.pinned_tweet {
        let mut lines = vec![
            ReceiptLine::new("TEXT:", &pinned.text),
            ReceiptLine::new("POSTED:", member_since(&pinned.created_at)),
            ReceiptLine::new("REPOSTS:", group_thousands(pinned.retweet_count)),
            ReceiptLine::new("REPLIES:", group_thousands(pinned.reply_count)),
            ReceiptLine::new("LIKES:", group_thousands(pinned.like_count)),
        ];
        if let Some(media) = pinned.media.as_ref().filter(|m| !m.is_empty()) {
            let noun = if media.len() == 1 {
                "attachment"
            } else {
                "attachments"
            };
            lines.push(ReceiptLine::new(
                "MEDIA:",
                format!("{} {noun}", media.len()),
            ));
        }
        sections.push(Section {
            heading: Some("PINNED POST"),
            lines,
        });
    }

    sections
}

fn github_sections(user: &GithubUser) -> Vec<Section> {
    vec![Section {
        heading: None,
        lines: vec![
            ReceiptLine::new("CUSTOMER:", &user.login),
            ReceiptLine::new("REPOSITORIES:", group_thousands(user.public_repos)),
            ReceiptLine::new("FOLLOWERS:", group_thousands(user.followers)),
            ReceiptLine::new("FOLLOWING:", group_thousands(user.following)),
            ReceiptLine::new("MEMBER SINCE:", member_since(&user.created_at)),
        ],
    }]
}

/// `ALICE-lq2x9k0`: uppercased handle plus the issue time in base 36 millis.
pub fn order_number(username: &str, issued_at: DateTime<Utc>) -> String {
    let millis = u64::try_from(issued_at.timestamp_millis()).unwrap_or(0);
    format!("{}-{}", username.to_uppercase(), to_base36(millis))
}

/// Format a count with comma thousands separators.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `Mar 04, 2012`, or the raw value when it is not RFC 3339.
fn member_since(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(dt) => dt.format("%b %d, %Y").to_string(),
        None if raw.is_empty() => "???".to_string(),
        None => raw.to_string(),
    }
}
