//! Header selectors.
//!
//! Selectors are tokenized by `cssparser`, so escapes (`#a\.b`), comments and
//! quoting follow CSS rules. Supported grammar:
//!
//! | Syntax                | Meaning                                   |
//! |-----------------------|-------------------------------------------|
//! | `h2, h3`              | either selector                           |
//! | `article h2`          | `h2` anywhere below an `article`          |
//! | `main > h2`           | `h2` whose parent is `main`               |
//! | `h2 + h3`             | `h3` right after an `h2` sibling          |
//! | `h2 ~ h3`             | `h3` after an `h2` sibling                |
//! | `*`                   | any element                               |
//! | `#intro`, `.toc`      | id, class                                 |
//! | `[data-x]`            | attribute present                         |
//! | `[lang="en"]`         | also `~=`, `\|=`, `^=`, `$=`, `*=` and an `i` flag |
//! | `:not(.x)`, `:is(..)` | negation, alternatives                    |
//! | `:first-child` ...    | `first-`, `last-`, `only-` child/of-type, `:root` |
//! | `:nth-child(2n+1)`    | also `nth-last-child`, `nth-(last-)of-type` |

use super::{Document, NodeId, SelectorError};
use cssparser::{
    BasicParseErrorKind, ParseError, ParseErrorKind, Parser, ParserInput, SourceLocation, ToCss,
    Token, parse_nth,
};
use std::iter::successors;

/// A parsed selector list.
#[derive(Debug, Clone)]
pub struct Selector {
    source: String,
    groups: Vec<Complex>,
}

/// Compound selectors joined by combinators, left to right.
///
/// The combinator stored with each compound links it to the previous one;
/// the first compound's combinator is unused.
#[derive(Debug, Clone)]
struct Complex(Vec<(Combinator, Compound)>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

#[derive(Debug, Clone, Default)]
struct Compound {
    tag: Option<String>,
    conditions: Vec<Condition>,
}

#[derive(Debug, Clone)]
enum Condition {
    Id(String),
    Class(String),
    Attr {
        name: String,
        test: Option<AttrTest>,
    },
    Not(Vec<Complex>),
    Is(Vec<Complex>),
    Root,
    /// 1-based sibling position matching `a*n + b` for some `n >= 0`.
    Nth {
        a: i32,
        b: i32,
        from_end: bool,
        of_type: bool,
    },
}

#[derive(Debug, Clone)]
struct AttrTest {
    op: AttrOp,
    value: String,
    ignore_case: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    /// `=`
    Equals,
    /// `~=`
    Includes,
    /// `|=`
    DashMatch,
    /// `^=`
    Prefix,
    /// `$=`
    Suffix,
    /// `*=`
    Substring,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let mut input = ParserInput::new(source);
        let mut parser = Parser::new(&mut input);
        let groups = selector_list(&mut parser).map_err(|err| selector_error(source, err))?;
        Ok(Self {
            source: source.to_owned(),
            groups,
        })
    }

    /// The selector text as given.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the element matches any group.
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        any_matches(&self.groups, doc, id)
    }
}

fn any_matches(groups: &[Complex], doc: &Document, id: NodeId) -> bool {
    groups.iter().any(|complex| complex.matches(doc, id))
}

// ============================================================================
// Matching
// ============================================================================

impl Complex {
    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        match self.0.split_last() {
            Some(((combinator, last), rest)) => {
                last.matches(doc, id) && matches_before(doc, id, rest, *combinator)
            }
            None => false,
        }
    }
}

/// Match `parts` right to left, moving from `id` along `combinator`.
fn matches_before(
    doc: &Document,
    id: NodeId,
    parts: &[(Combinator, Compound)],
    combinator: Combinator,
) -> bool {
    let Some(((next, compound), rest)) = parts.split_last() else {
        return true;
    };
    let matches_at = |candidate: NodeId| {
        compound.matches(doc, candidate) && matches_before(doc, candidate, rest, *next)
    };

    match combinator {
        Combinator::Child => doc.parent(id).is_some_and(matches_at),
        Combinator::Adjacent => doc.prev_sibling(id).is_some_and(matches_at),
        Combinator::Descendant => {
            successors(doc.parent(id), |&current| doc.parent(current)).any(matches_at)
        }
        Combinator::Sibling => {
            successors(doc.prev_sibling(id), |&current| doc.prev_sibling(current)).any(matches_at)
        }
    }
}

impl Compound {
    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        if let Some(tag) = &self.tag
            && doc.tag_name(id) != tag
        {
            return false;
        }
        self.conditions
            .iter()
            .all(|condition| condition.matches(doc, id))
    }
}

impl Condition {
    fn matches(&self, doc: &Document, id: NodeId) -> bool {
        match self {
            Self::Id(value) => doc.attr(id, "id") == Some(value.as_str()),
            Self::Class(class) => doc
                .attr(id, "class")
                .is_some_and(|classes| classes.split_whitespace().any(|c| c == class)),
            Self::Attr { name, test } => match (doc.attr(id, name), test) {
                (Some(actual), Some(test)) => test.matches(actual),
                (found, None) => found.is_some(),
                (None, Some(_)) => false,
            },
            Self::Not(groups) => !any_matches(groups, doc, id),
            Self::Is(groups) => any_matches(groups, doc, id),
            Self::Root => doc.parent(id).is_none(),
            Self::Nth {
                a,
                b,
                from_end,
                of_type,
            } => {
                let index = sibling_index(doc, id, *from_end, *of_type);
                let (a, b) = (i64::from(*a), i64::from(*b));
                match a {
                    0 => index == b,
                    _ => {
                        let offset = index - b;
                        offset % a == 0 && offset / a >= 0
                    }
                }
            }
        }
    }
}

/// 1-based position among element siblings, optionally only those sharing
/// the tag name.
fn sibling_index(doc: &Document, id: NodeId, from_end: bool, of_type: bool) -> i64 {
    let step = if from_end {
        Document::next_sibling
    } else {
        Document::prev_sibling
    };
    let tag = doc.tag_name(id);
    let before = successors(step(doc, id), |&current| step(doc, current))
        .filter(|&sibling| !of_type || doc.tag_name(sibling) == tag)
        .count();
    before as i64 + 1
}

impl AttrTest {
    fn matches(&self, actual: &str) -> bool {
        if self.ignore_case {
            self.op
                .matches(&actual.to_lowercase(), &self.value.to_lowercase())
        } else {
            self.op.matches(actual, &self.value)
        }
    }
}

impl AttrOp {
    fn matches(self, actual: &str, expected: &str) -> bool {
        match self {
            Self::Equals => actual == expected,
            Self::Includes => {
                !expected.is_empty()
                    && !expected.contains(char::is_whitespace)
                    && actual.split_whitespace().any(|word| word == expected)
            }
            Self::DashMatch => {
                actual == expected
                    || actual
                        .strip_prefix(expected)
                        .is_some_and(|rest| rest.starts_with('-'))
            }
            Self::Prefix => !expected.is_empty() && actual.starts_with(expected),
            Self::Suffix => !expected.is_empty() && actual.ends_with(expected),
            Self::Substring => !expected.is_empty() && actual.contains(expected),
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse failure raised by this module, positioned by byte offset.
#[derive(Debug)]
struct Failure {
    position: usize,
    reason: String,
}

type ParseResult<'i, T> = Result<T, ParseError<'i, Failure>>;

fn failure<'i>(
    input: &Parser<'i, '_>,
    position: usize,
    reason: impl Into<String>,
) -> ParseError<'i, Failure> {
    input.new_custom_error(Failure {
        position,
        reason: reason.into(),
    })
}

fn unexpected<'i>(
    input: &Parser<'i, '_>,
    position: usize,
    token: &Token<'_>,
) -> ParseError<'i, Failure> {
    failure(input, position, format!("unexpected `{}`", token.to_css_string()))
}

fn selector_list<'i>(input: &mut Parser<'i, '_>) -> ParseResult<'i, Vec<Complex>> {
    input.parse_comma_separated(|input| complex(input))
}

fn complex<'i>(input: &mut Parser<'i, '_>) -> ParseResult<'i, Complex> {
    input.skip_whitespace();
    let mut parts = vec![(Combinator::Descendant, compound(input)?)];
    loop {
        let mut had_whitespace = false;
        let (position, state, token) = loop {
            let position = input.position().byte_index();
            let state = input.state();
            match input.next_including_whitespace() {
                Ok(Token::WhiteSpace(_)) => had_whitespace = true,
                Ok(token) => break (position, state, token.clone()),
                Err(_) => return Ok(Complex(parts)),
            }
        };

        let combinator = match token {
            Token::Delim('>') => Combinator::Child,
            Token::Delim('+') => Combinator::Adjacent,
            Token::Delim('~') => Combinator::Sibling,
            _ if had_whitespace => {
                input.reset(&state);
                Combinator::Descendant
            }
            other => return Err(unexpected(input, position, &other)),
        };
        input.skip_whitespace();
        parts.push((combinator, compound(input)?));
    }
}

fn compound<'i>(input: &mut Parser<'i, '_>) -> ParseResult<'i, Compound> {
    let start = input.position().byte_index();
    let mut compound = Compound::default();
    let mut empty = true;

    loop {
        let state = input.state();
        let token = match input.next_including_whitespace() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        match token {
            Token::Ident(name) if empty => compound.tag = Some(name.to_ascii_lowercase()),
            Token::Delim('*') if empty => {}
            Token::IDHash(id) | Token::Hash(id) => {
                compound.conditions.push(Condition::Id(id.as_ref().to_string()));
            }
            Token::Delim('.') => {
                let position = input.position().byte_index();
                let token = input.next_including_whitespace()?.clone();
                match token {
                    Token::Ident(class) => compound
                        .conditions
                        .push(Condition::Class(class.as_ref().to_string())),
                    other => return Err(unexpected(input, position, &other)),
                }
            }
            Token::SquareBracketBlock => {
                let condition = input.parse_nested_block(|input| attribute(input))?;
                compound.conditions.push(condition);
            }
            Token::Colon => pseudo_class(input, &mut compound.conditions)?,
            _ => {
                input.reset(&state);
                break;
            }
        }
        empty = false;
    }

    if empty {
        return Err(failure(input, start, "expected a selector"));
    }
    Ok(compound)
}

/// Body of `[...]`.
fn attribute<'i>(input: &mut Parser<'i, '_>) -> ParseResult<'i, Condition> {
    input.skip_whitespace();
    let position = input.position().byte_index();
    let token = input.next()?.clone();
    let name = match token {
        Token::Ident(name) => name.to_ascii_lowercase(),
        other => return Err(unexpected(input, position, &other)),
    };
    if input.is_exhausted() {
        return Ok(Condition::Attr { name, test: None });
    }

    input.skip_whitespace();
    let position = input.position().byte_index();
    let token = input.next()?.clone();
    let op = match token {
        Token::Delim('=') => AttrOp::Equals,
        Token::IncludeMatch => AttrOp::Includes,
        Token::DashMatch => AttrOp::DashMatch,
        Token::PrefixMatch => AttrOp::Prefix,
        Token::SuffixMatch => AttrOp::Suffix,
        Token::SubstringMatch => AttrOp::Substring,
        other => return Err(unexpected(input, position, &other)),
    };

    input.skip_whitespace();
    let position = input.position().byte_index();
    let token = input.next()?.clone();
    let value = match token {
        Token::Ident(value) | Token::QuotedString(value) => value.as_ref().to_string(),
        Token::Number {
            int_value: Some(value),
            has_sign: false,
            ..
        } => value.to_string(),
        other => return Err(unexpected(input, position, &other)),
    };

    let ignore_case = if input.is_exhausted() {
        false
    } else {
        input.skip_whitespace();
        let position = input.position().byte_index();
        let token = input.next()?.clone();
        match token {
            Token::Ident(flag) if flag.eq_ignore_ascii_case("i") => true,
            Token::Ident(flag) if flag.eq_ignore_ascii_case("s") => false,
            other => return Err(unexpected(input, position, &other)),
        }
    };

    Ok(Condition::Attr {
        name,
        test: Some(AttrTest {
            op,
            value,
            ignore_case,
        }),
    })
}

/// Pseudo-class after its `:`.
fn pseudo_class<'i>(
    input: &mut Parser<'i, '_>,
    conditions: &mut Vec<Condition>,
) -> ParseResult<'i, ()> {
    let position = input.position().byte_index();
    let nth = |a, b, from_end, of_type| Condition::Nth {
        a,
        b,
        from_end,
        of_type,
    };

    let token = input.next_including_whitespace()?.clone();
    match token {
        Token::Ident(name) => match name.to_ascii_lowercase().as_str() {
            "root" => conditions.push(Condition::Root),
            "first-child" => conditions.push(nth(0, 1, false, false)),
            "last-child" => conditions.push(nth(0, 1, true, false)),
            "first-of-type" => conditions.push(nth(0, 1, false, true)),
            "last-of-type" => conditions.push(nth(0, 1, true, true)),
            "only-child" => conditions.extend([nth(0, 1, false, false), nth(0, 1, true, false)]),
            "only-of-type" => conditions.extend([nth(0, 1, false, true), nth(0, 1, true, true)]),
            other => {
                return Err(failure(input, position, format!("unsupported pseudo-class `:{other}`")));
            }
        },
        Token::Function(name) => {
            let name = name.to_ascii_lowercase();
            let (from_end, of_type) = match name.as_str() {
                "not" | "is" | "where" => {
                    let groups = input.parse_nested_block(|input| selector_list(input))?;
                    conditions.push(match name.as_str() {
                        "not" => Condition::Not(groups),
                        _ => Condition::Is(groups),
                    });
                    return Ok(());
                }
                "nth-child" => (false, false),
                "nth-last-child" => (true, false),
                "nth-of-type" => (false, true),
                "nth-last-of-type" => (true, true),
                other => {
                    return Err(failure(input, position, format!("unsupported pseudo-class `:{other}()`")));
                }
            };
            let (a, b) = input.parse_nested_block(|input| nth_arguments(input))?;
            conditions.push(nth(a, b, from_end, of_type));
        }
        other => return Err(unexpected(input, position, &other)),
    }
    Ok(())
}

/// `an+b` inside `:nth-*()`.
fn nth_arguments<'i>(input: &mut Parser<'i, '_>) -> ParseResult<'i, (i32, i32)> {
    Ok(parse_nth(input)?)
}

fn selector_error(source: &str, err: ParseError<'_, Failure>) -> SelectorError {
    let (position, reason) = match err.kind {
        ParseErrorKind::Custom(Failure { position, reason }) => (position, reason),
        ParseErrorKind::Basic(BasicParseErrorKind::UnexpectedToken(token)) => (
            byte_offset(source, err.location),
            format!("unexpected `{}`", token.to_css_string()),
        ),
        ParseErrorKind::Basic(BasicParseErrorKind::EndOfInput) => {
            (byte_offset(source, err.location), "unexpected end of selector".to_owned())
        }
        ParseErrorKind::Basic(_) => (byte_offset(source, err.location), "malformed selector".to_owned()),
    };
    SelectorError {
        selector: source.to_owned(),
        position,
        reason,
    }
}

/// Byte offset of a line/column location (0-based line, 1-based column).
fn byte_offset(source: &str, location: SourceLocation) -> usize {
    let line_start: usize = source
        .split_inclusive('\n')
        .take(location.line as usize)
        .map(str::len)
        .sum();
    let column = location.column.saturating_sub(1) as usize;
    source[line_start..]
        .char_indices()
        .nth(column)
        .map_or(source.len(), |(offset, _)| line_start + offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<main>
<article class="post featured" lang="en">
<h2 id="a">A</h2>
<section><h3 data-level="3">B</h3></section>
</article>
<h2 class="aside">C</h2>
</main>"#;

    fn texts(selector: &str) -> Vec<String> {
        let doc = Document::parse(PAGE).unwrap();
        doc.select(selector)
            .unwrap()
            .into_iter()
            .map(|id| doc.text(id).to_string())
            .collect()
    }

    #[test]
    fn test_group_preserves_document_order() {
        assert_eq!(texts("h3, h2"), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_tag_is_case_insensitive() {
        assert_eq!(texts("H2"), vec!["A", "C"]);
    }

    #[test]
    fn test_descendant_and_child() {
        assert_eq!(texts("article h3"), vec!["B"]);
        assert!(texts("article > h3").is_empty());
        assert_eq!(texts("section > h3"), vec!["B"]);
        assert_eq!(texts("main > h2"), vec!["C"]);
        assert_eq!(texts("main h2"), vec!["A", "C"]);
    }

    #[test]
    fn test_id_class_and_attributes() {
        assert_eq!(texts("#a"), vec!["A"]);
        assert_eq!(texts("h2.aside"), vec!["C"]);
        assert_eq!(texts(".featured h2"), vec!["A"]);
        assert_eq!(texts("[data-level]"), vec!["B"]);
        assert_eq!(texts("[data-level=\"3\"]"), vec!["B"]);
        assert_eq!(texts("[lang=en] h2"), vec!["A"]);
        assert!(texts("[data-level='4']").is_empty());
    }

    #[test]
    fn test_universal() {
        assert_eq!(texts("section > *"), vec!["B"]);
    }

    #[test]
    fn test_no_match_is_empty() {
        assert!(texts("h6").is_empty());
    }

    #[test]
    fn test_sibling_combinators() {
        let doc = Document::parse("<h2>A</h2><p>p</p><h3>B</h3><h2>C</h2><h3>D</h3>").unwrap();
        let found = |selector: &str| -> Vec<String> {
            doc.select(selector)
                .unwrap()
                .into_iter()
                .map(|id| doc.text(id).to_string())
                .collect()
        };

        assert_eq!(found("h2 + h3"), vec!["D"]);
        assert_eq!(found("h2+h3"), vec!["D"]);
        assert_eq!(found("h2 ~ h3"), vec!["B", "D"]);
        assert_eq!(found("p ~ h2 + h3"), vec!["D"]);
    }

    #[test]
    fn test_attribute_operators() {
        assert_eq!(texts("[id^=a]"), vec!["A"]);
        assert_eq!(texts("[class~=featured] h2"), vec!["A"]);
        assert_eq!(texts("[class^=po] > h2"), vec!["A"]);
        assert_eq!(texts("[class$=\"side\"]"), vec!["C"]);
        assert_eq!(texts("[class*=sid]"), vec!["C"]);
        assert_eq!(texts("[lang|=en] h2"), vec!["A"]);
        assert_eq!(texts("[data-level=3]"), vec!["B"]);
        assert_eq!(texts("h2[class=ASIDE i]"), vec!["C"]);
        assert!(texts("h2[class=ASIDE]").is_empty());
        assert!(texts("[class~=\"post featured\"]").is_empty());
    }

    #[test]
    fn test_pseudo_classes() {
        assert_eq!(texts("h2:not(.x)"), vec!["A", "C"]);
        assert_eq!(texts("h2:not(.aside, #zzz)"), vec!["A"]);
        assert_eq!(texts(":is(h3, .aside)"), vec!["B", "C"]);
        assert_eq!(texts("main > :last-child"), vec!["C"]);
        assert_eq!(texts("article > :first-child"), vec!["A"]);
        assert_eq!(texts("section > :only-child"), vec!["B"]);
        assert_eq!(texts("main > h2:first-of-type"), vec!["C"]);
        assert_eq!(texts("article > :nth-child(2n+1)"), vec!["A"]);
        assert_eq!(texts("main > :nth-last-child(1)"), vec!["C"]);
        assert_eq!(texts(":root > article > h2"), vec!["A"]);
    }

    #[test]
    fn test_escapes_and_comments() {
        let doc = Document::parse(r#"<h2 id="a.b">A</h2><h2 id="c">C</h2>"#).unwrap();
        assert_eq!(doc.select("#a\\.b").unwrap().len(), 1);
        assert_eq!(doc.select("h2#a\\.b").unwrap().len(), 1);
        assert_eq!(doc.select("h2 /* c */").unwrap().len(), 2);
        assert_eq!(doc.select("/* all */ h2, /* none */ h6").unwrap().len(), 2);
        assert_eq!(doc.select("[id='a.b']").unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_selectors() {
        for input in [
            "", "  ", "h2,,h3", "h2,", "h2[", "h2[id=", "h2[id=]", "h2 >", "h2 + ", "h2!", "#",
            ".", "h2:hover", "h2::before", ":not(", "h2:nth-child(x)", "[id^=a b]",
        ] {
            assert!(Selector::parse(input).is_err(), "`{input}` should be rejected");
        }
    }

    #[test]
    fn test_unsupported_pseudo_class_is_named() {
        let err = Selector::parse("h2:hover").unwrap_err();
        assert_eq!(err.position, 3);
        assert!(err.reason.contains(":hover"));
    }

    #[test]
    fn test_error_reports_position() {
        let err = Selector::parse("h2,,h3").unwrap_err();
        assert_eq!(err.position, 3);
        assert_eq!(err.selector, "h2,,h3");
        assert!(err.to_string().contains("invalid selector `h2,,h3`"));
    }

    #[test]
    fn test_as_str() {
        assert_eq!(Selector::parse("h1, h2").unwrap().as_str(), "h1, h2");
    }
}
