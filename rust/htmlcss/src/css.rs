//! Style-sheet model and loading using cssparser
//!
//! Selectors are linked lists starting at the leaf compound, so a rule set
//! can be filed under the element its leaf selector names. A selector list
//! such as `h1, h2 { ... }` becomes one rule set per selector, each with its
//! own copy of the declaration dictionary.
//!
//! Matching selectors against a document and cascading properties are not
//! handled here.

use std::fmt;

use cssparser::{Delimiter, ParseError, ParseErrorKind, Parser, ParserInput, ToCss, Token};

use crate::dict::Dict;
use crate::error::{Error, Result};
use crate::html::Element;
use crate::string_pool::{StringPool, StringRef};

/// Selector matching statement kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Match {
    /// `[NAME]`
    AttrExist,
    /// `[NAME=VALUE]`
    AttrEquals,
    /// `[NAME*=VALUE]`
    AttrContains,
    /// `[NAME^=VALUE]`
    AttrBegins,
    /// `[NAME$=VALUE]`
    AttrEnds,
    /// `[NAME|=VALUE]`, language/prefix match
    AttrLang,
    /// `[NAME~=VALUE]`, space-delimited value match
    AttrSpace,
    /// `.NAME`
    Class,
    /// `#NAME`
    Id,
    /// `:NAME` or `:NAME(VALUE)`
    PseudoClass,
}

impl Match {
    fn operator(self) -> &'static str {
        match self {
            Match::AttrEquals => "=",
            Match::AttrContains => "*=",
            Match::AttrBegins => "^=",
            Match::AttrEnds => "$=",
            Match::AttrLang => "|=",
            Match::AttrSpace => "~=",
            _ => "",
        }
    }
}

/// Relationship of a compound selector to the previous one
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Relation {
    /// `E F`
    #[default]
    Descendant,
    /// `E > F`
    ImmediateChild,
    /// `E ~ F`
    Sibling,
    /// `E + F`
    ImmediateSibling,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectorStmt {
    kind: Match,
    name: StringRef,
    value: Option<StringRef>,
}

impl SelectorStmt {
    pub fn new(kind: Match, name: StringRef, value: Option<StringRef>) -> Self {
        Self { kind, name, value }
    }

    pub fn kind(&self) -> Match {
        self.kind
    }

    pub fn name(&self) -> &StringRef {
        &self.name
    }

    pub fn value(&self) -> Option<&StringRef> {
        self.value.as_ref()
    }
}

impl fmt::Display for SelectorStmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = &self.name;
        match (self.kind, &self.value) {
            (Match::Class, _) => write!(f, ".{name}"),
            (Match::Id, _) => write!(f, "#{name}"),
            (Match::PseudoClass, Some(value)) => write!(f, ":{name}({value})"),
            (Match::PseudoClass, None) => write!(f, ":{name}"),
            (kind, Some(value)) => write!(f, "[{name}{}\"{value}\"]", kind.operator()),
            (_, None) => write!(f, "[{name}]"),
        }
    }
}

/// Compound selector, linked to the compound before it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    prev: Option<Box<Selector>>,
    element: Element,
    relation: Relation,
    stmts: Vec<SelectorStmt>,
}

impl Selector {
    pub fn new(element: Element) -> Self {
        Self {
            prev: None,
            element,
            relation: Relation::Descendant,
            stmts: Vec::new(),
        }
    }

    /// Chain `self` after `prev`
    pub fn with_prev(mut self, prev: Selector, relation: Relation) -> Self {
        self.prev = Some(Box::new(prev));
        self.relation = relation;
        self
    }

    pub fn push_stmt(&mut self, stmt: SelectorStmt) {
        self.stmts.push(stmt);
    }

    pub fn prev(&self) -> Option<&Selector> {
        self.prev.as_deref()
    }

    pub fn element(&self) -> Element {
        self.element
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub fn stmts(&self) -> &[SelectorStmt] {
        &self.stmts
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prev) = &self.prev {
            write!(f, "{prev}")?;
            f.write_str(match self.relation {
                Relation::Descendant => " ",
                Relation::ImmediateChild => " > ",
                Relation::Sibling => " ~ ",
                Relation::ImmediateSibling => " + ",
            })?;
        }
        if self.element != Element::Wildcard || self.stmts.is_empty() {
            f.write_str(self.element.name())?;
        }
        for stmt in &self.stmts {
            write!(f, "{stmt}")?;
        }
        Ok(())
    }
}

/// Leaf selector plus its property declarations
#[derive(Clone, Debug)]
pub struct RuleSet<'p> {
    selector: Selector,
    props: Dict<'p>,
}

impl<'p> RuleSet<'p> {
    pub fn new(selector: Selector, props: Dict<'p>) -> Self {
        Self { selector, props }
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn props(&self) -> &Dict<'p> {
        &self.props
    }

    pub fn props_mut(&mut self) -> &mut Dict<'p> {
        &mut self.props
    }
}

/// Rule sets of a document, bucketed by leaf element
#[derive(Debug)]
pub struct Stylesheet<'p> {
    pool: &'p StringPool,
    rules: Vec<Vec<RuleSet<'p>>>,
}

impl<'p> Stylesheet<'p> {
    pub fn new(pool: &'p StringPool) -> Self {
        Self {
            pool,
            rules: (0..Element::COUNT).map(|_| Vec::new()).collect(),
        }
    }

    pub fn pool(&self) -> &'p StringPool {
        self.pool
    }

    /// Rule sets whose leaf selector names `element`
    pub fn rules(&self, element: Element) -> &[RuleSet<'p>] {
        &self.rules[element.index()]
    }

    pub fn rule_count(&self) -> usize {
        self.rules.iter().map(Vec::len).sum()
    }

    pub fn add_rule(&mut self, rule: RuleSet<'p>) {
        self.rules[rule.selector.element.index()].push(rule);
    }

    /// Parse a stylesheet and add its rule sets.
    ///
    /// Returns the number of rule sets added. Invalid rules, at-rules and
    /// invalid declarations are skipped with a warning; only allocation
    /// failures are returned as errors.
    pub fn load(&mut self, css: &str) -> Result<usize> {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut added = 0;

        while !parser.is_exhausted() {
            let location = parser.current_source_location();
            let Some(selectors) = parse_selector_list(&mut parser, self.pool)? else {
                log::warn!(
                    "skipping rule at {}:{}",
                    location.line + 1,
                    location.column
                );
                continue;
            };

            let mut props = Dict::new(self.pool);
            let parsed: std::result::Result<usize, ParseError<'_, Error>> =
                parser.parse_nested_block(|block| {
                    parse_declarations(block, &mut props)
                        .map_err(|err| block.new_custom_error::<Error, Error>(err))
                });
            if let Err(err) = parsed {
                match err.kind {
                    ParseErrorKind::Custom(err) => return Err(err),
                    ParseErrorKind::Basic(_) => log::warn!(
                        "malformed declaration block at {}:{}",
                        err.location.line + 1,
                        err.location.column
                    ),
                }
            }

            for selector in selectors {
                self.add_rule(RuleSet::new(selector, props.clone()));
                added += 1;
            }
        }

        log::debug!("loaded {} rule sets", added);
        Ok(added)
    }
}

/// Parse a `name: value; ...` declaration list into `props`.
///
/// Used for rule blocks and `style` attributes. Returns the number of
/// declarations stored; later declarations of the same property overwrite
/// earlier ones.
pub fn parse_declaration_list(css: &str, props: &mut Dict<'_>) -> Result<usize> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    parse_declarations(&mut parser, props)
}

fn parse_declarations(parser: &mut Parser<'_, '_>, props: &mut Dict<'_>) -> Result<usize> {
    let mut count = 0;
    while !parser.is_exhausted() {
        let parsed =
            parser.parse_until_after(Delimiter::Semicolon, |decl| parse_declaration(decl, props));
        match parsed {
            Ok(()) => count += 1,
            Err(ParseError {
                kind: ParseErrorKind::Custom(err),
                ..
            }) => return Err(err),
            Err(err) => log::warn!(
                "ignoring declaration at {}:{}",
                err.location.line + 1,
                err.location.column
            ),
        }
    }
    Ok(count)
}

fn parse_declaration<'i>(
    parser: &mut Parser<'i, '_>,
    props: &mut Dict<'_>,
) -> std::result::Result<(), ParseError<'i, Error>> {
    let name = parser.expect_ident()?.clone();
    parser.expect_colon()?;

    let mut value = String::new();
    collect_value::<Error>(parser, &mut value)?;
    let value = value.trim();
    if value.is_empty() {
        return Err(parser.new_error_for_next_token());
    }

    props
        .set(&name, value)
        .map_err(|err| parser.new_custom_error(err))
}

/// Serialize the remaining tokens, collapsing whitespace runs to one space.
fn collect_value<'i, E>(
    parser: &mut Parser<'i, '_>,
    out: &mut String,
) -> std::result::Result<(), ParseError<'i, E>> {
    loop {
        let token = match parser.next_including_whitespace() {
            Ok(token) => token.clone(),
            Err(_) => return Ok(()),
        };
        match token {
            Token::WhiteSpace(_) => {
                if !out.is_empty() && !out.ends_with(' ') {
                    out.push(' ');
                }
            }
            Token::Function(_)
            | Token::ParenthesisBlock
            | Token::SquareBracketBlock
            | Token::CurlyBracketBlock => {
                out.push_str(&token.to_css_string());
                parser.parse_nested_block(|block| collect_value::<E>(block, out))?;
                out.push(match token {
                    Token::SquareBracketBlock => ']',
                    Token::CurlyBracketBlock => '}',
                    _ => ')',
                });
            }
            _ => out.push_str(&token.to_css_string()),
        }
    }
}

/// Builds selector chains from a prelude, one compound at a time.
#[derive(Default)]
struct ChainBuilder {
    chains: Vec<Selector>,
    current: Option<Selector>,
    pending: Option<Relation>,
}

impl ChainBuilder {
    fn is_empty(&self) -> bool {
        self.chains.is_empty() && self.current.is_none()
    }

    fn open(&mut self, element: Element) {
        let relation = self.pending.take().unwrap_or_default();
        let selector = Selector::new(element);
        self.current = Some(match self.current.take() {
            Some(prev) => selector.with_prev(prev, relation),
            None => selector,
        });
    }

    fn whitespace(&mut self) {
        if self.current.is_some() && self.pending.is_none() {
            self.pending = Some(Relation::Descendant);
        }
    }

    fn combinator(&mut self, relation: Relation) -> bool {
        match (&self.current, self.pending) {
            (Some(_), None | Some(Relation::Descendant)) => {
                self.pending = Some(relation);
                true
            }
            _ => false,
        }
    }

    fn element(&mut self, element: Element) -> bool {
        if element == Element::Unknown || (self.current.is_some() && self.pending.is_none()) {
            return false;
        }
        self.open(element);
        true
    }

    fn statement(&mut self, stmt: Option<SelectorStmt>) -> bool {
        let Some(stmt) = stmt else {
            return false;
        };
        if self.current.is_none() || self.pending.is_some() {
            self.open(Element::Wildcard);
        }
        if let Some(selector) = self.current.as_mut() {
            selector.push_stmt(stmt);
        }
        true
    }

    fn end_chain(&mut self) -> bool {
        match (self.current.take(), self.pending.take()) {
            (Some(selector), None | Some(Relation::Descendant)) => {
                self.chains.push(selector);
                true
            }
            _ => false,
        }
    }

    fn finish(mut self) -> Option<Vec<Selector>> {
        self.end_chain().then_some(self.chains)
    }
}

/// Parse a selector list up to and including the `{` of its block.
///
/// `Ok(None)` means the prelude was not a usable selector list; the parser
/// is then positioned after the offending block or statement.
fn parse_selector_list(
    parser: &mut Parser<'_, '_>,
    pool: &StringPool,
) -> Result<Option<Vec<Selector>>> {
    let mut chain = ChainBuilder::default();
    let mut valid = true;

    loop {
        let token = match parser.next_including_whitespace() {
            Ok(token) => token.clone(),
            Err(_) => return Ok(None),
        };

        match token {
            Token::CurlyBracketBlock => return Ok(if valid { chain.finish() } else { None }),
            Token::Semicolon => return Ok(None),
            _ if !valid => {}
            Token::CDO | Token::CDC if chain.is_empty() => {}
            Token::WhiteSpace(_) => chain.whitespace(),
            Token::Comma => valid = chain.end_chain(),
            Token::Ident(name) => valid = chain.element(Element::from_name(&name)),
            Token::Delim('*') => valid = chain.element(Element::Wildcard),
            Token::Delim('>') => valid = chain.combinator(Relation::ImmediateChild),
            Token::Delim('+') => valid = chain.combinator(Relation::ImmediateSibling),
            Token::Delim('~') => valid = chain.combinator(Relation::Sibling),
            Token::Delim('.') => {
                let class = match parser.next_including_whitespace() {
                    Ok(Token::Ident(name)) => Some(pool.intern(name)?),
                    _ => None,
                };
                let stmt = class.map(|name| SelectorStmt::new(Match::Class, name, None));
                valid = chain.statement(stmt);
            }
            Token::IDHash(name) => {
                let name = pool.intern(&name)?;
                valid = chain.statement(Some(SelectorStmt::new(Match::Id, name, None)));
            }
            Token::Colon => {
                let stmt = parse_pseudo_class(parser, pool)?;
                valid = chain.statement(stmt);
            }
            Token::SquareBracketBlock => {
                let stmt = parse_attribute(parser, pool)?;
                valid = chain.statement(stmt);
            }
            _ => valid = false,
        }
    }
}

fn parse_pseudo_class<'i>(
    parser: &mut Parser<'i, '_>,
    pool: &StringPool,
) -> Result<Option<SelectorStmt>> {
    let mut token = match parser.next_including_whitespace() {
        Ok(token) => token.clone(),
        Err(_) => return Ok(None),
    };
    // Pseudo-elements (`::before`) are stored like pseudo-classes.
    if matches!(token, Token::Colon) {
        token = match parser.next_including_whitespace() {
            Ok(token) => token.clone(),
            Err(_) => return Ok(None),
        };
    }

    match token {
        Token::Ident(name) => {
            let name = pool.intern(&name)?;
            Ok(Some(SelectorStmt::new(Match::PseudoClass, name, None)))
        }
        Token::Function(name) => {
            let args = parser.parse_nested_block(
                |block| -> std::result::Result<String, ParseError<'i, ()>> {
                    let mut text = String::new();
                    collect_value::<()>(block, &mut text)?;
                    Ok(text)
                },
            );
            let Ok(args) = args else {
                return Ok(None);
            };
            let name = pool.intern(&name)?;
            let value = pool.intern(args.trim())?;
            Ok(Some(SelectorStmt::new(Match::PseudoClass, name, Some(value))))
        }
        _ => Ok(None),
    }
}

fn parse_attribute<'i>(
    parser: &mut Parser<'i, '_>,
    pool: &StringPool,
) -> Result<Option<SelectorStmt>> {
    let parsed = parser.parse_nested_block(|attr| -> std::result::Result<_, ParseError<'i, ()>> {
        let name = attr.expect_ident()?.clone();
        let location = attr.current_source_location();
        let kind = match attr.next() {
            Err(_) => return Ok((name, Match::AttrExist, None)),
            Ok(Token::Delim('=')) => Match::AttrEquals,
            Ok(Token::IncludeMatch) => Match::AttrSpace,
            Ok(Token::DashMatch) => Match::AttrLang,
            Ok(Token::PrefixMatch) => Match::AttrBegins,
            Ok(Token::SuffixMatch) => Match::AttrEnds,
            Ok(Token::SubstringMatch) => Match::AttrContains,
            Ok(token) => return Err(location.new_unexpected_token_error(token.clone())),
        };
        let location = attr.current_source_location();
        let value = match attr.next()? {
            Token::Ident(value) | Token::QuotedString(value) => value.clone(),
            token => return Err(location.new_unexpected_token_error(token.clone())),
        };
        // Case-sensitivity flag, `[type="a" i]`
        if !attr.is_exhausted() {
            attr.expect_ident()?;
        }
        Ok((name, kind, Some(value)))
    });

    let Ok((name, kind, value)) = parsed else {
        return Ok(None);
    };
    let name = pool.intern(&name)?;
    let value = value.map(|value| pool.intern(&value)).transpose()?;
    Ok(Some(SelectorStmt::new(kind, name, value)))
}
