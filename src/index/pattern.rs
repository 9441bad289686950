//! Partition-name patterns.
//!
//! Patterns use moment-style date tokens with `[...]` for literal text, e.g.
//! `[logstash-]YYYY.MM.DD`.

use chrono::{Datelike, NaiveDateTime, Timelike};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Year,
    ShortYear,
    IsoYear,
    ShortIsoYear,
    PaddedMonth,
    Month,
    PaddedDay,
    Day,
    PaddedDayOfYear,
    DayOfYear,
    PaddedHour,
    Hour,
    PaddedWeek,
    Week,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePattern {
    tokens: Vec<Token>,
}

fn token_for(letter: char, run: usize) -> Option<Token> {
    let token = match (letter, run) {
        ('Y', 4) => Token::Year,
        ('Y', 2) => Token::ShortYear,
        ('G' | 'g', 4) => Token::IsoYear,
        ('G' | 'g', 2) => Token::ShortIsoYear,
        ('M', 2) => Token::PaddedMonth,
        ('M', 1) => Token::Month,
        ('D', 4) => Token::PaddedDayOfYear,
        ('D', 3) => Token::DayOfYear,
        ('D', 2) => Token::PaddedDay,
        ('D', 1) => Token::Day,
        ('H', 2) => Token::PaddedHour,
        ('H', 1) => Token::Hour,
        ('W' | 'w', 2) => Token::PaddedWeek,
        ('W' | 'w', 1) => Token::Week,
        _ => return None,
    };
    Some(token)
}

impl DatePattern {
    pub fn parse(pattern: &str) -> Self {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '[' {
                for inner in chars.by_ref() {
                    if inner == ']' {
                        break;
                    }
                    literal.push(inner);
                }
                continue;
            }

            let mut run = 1;
            while chars.peek() == Some(&c) {
                chars.next();
                run += 1;
            }
            match token_for(c, run) {
                Some(token) => {
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(token);
                }
                None => literal.extend(std::iter::repeat_n(c, run)),
            }
        }
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }
        Self { tokens }
    }

    pub fn format(&self, instant: &NaiveDateTime) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Year => out.push_str(&format!("{:04}", instant.year())),
                Token::ShortYear => out.push_str(&format!("{:02}", instant.year().rem_euclid(100))),
                Token::IsoYear => out.push_str(&format!("{:04}", instant.iso_week().year())),
                Token::ShortIsoYear => {
                    out.push_str(&format!("{:02}", instant.iso_week().year().rem_euclid(100)))
                }
                Token::PaddedMonth => out.push_str(&format!("{:02}", instant.month())),
                Token::Month => out.push_str(&instant.month().to_string()),
                Token::PaddedDay => out.push_str(&format!("{:02}", instant.day())),
                Token::Day => out.push_str(&instant.day().to_string()),
                Token::PaddedDayOfYear => out.push_str(&format!("{:03}", instant.ordinal())),
                Token::DayOfYear => out.push_str(&instant.ordinal().to_string()),
                Token::PaddedHour => out.push_str(&format!("{:02}", instant.hour())),
                Token::Hour => out.push_str(&instant.hour().to_string()),
                Token::PaddedWeek => out.push_str(&format!("{:02}", instant.iso_week().week())),
                Token::Week => out.push_str(&instant.iso_week().week().to_string()),
            }
        }
        out
    }
}
