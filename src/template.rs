//! Command templates.
//!
//! A [`Template`] is an ordered list of [`Fragment`]s which is rendered against
//! a target's name and its dependency list. Templates are usually written in
//! the familiar macro form and parsed with [`Template::parse`]:
//!
//! | Token | Expands to                                              |
//! |-------|---------------------------------------------------------|
//! | `$@`  | the target name                                         |
//! | `$<`  | the first dependency (nothing if there is none)         |
//! | `$^`  | every dependency in order, each followed by one space   |
//! | `\$`  | a literal `$`, the following character is not a token   |
//!
//! Any other `$` or `\` is copied through unchanged. Unknown sequences are
//! never dropped, unlike in expanders that discard them, so `$HOME`, `${CC}`
//! or `\n` reach the shell exactly as written. `$$` is the one exception: it
//! emits a single `$` and the next character still forms a token, so `$$@`
//! renders as `$` followed by the name.
//!
//! The macro form can't address "the n-th dependency", the builder methods on
//! [`Template`] can.

use std::fmt::Write;
use std::iter::Peekable;
use std::str::Chars;

const MARKER: char = '$';
const ESCAPE: char = '\\';

/// A single piece of a command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Text copied verbatim.
    Literal(String),
    /// The target's own name.
    Name,
    /// The dependency at a 1-based position, position `0` is the target name.
    Dependency(usize),
    /// All dependencies joined, each followed by a single space.
    Dependencies,
}

impl Fragment {
    fn render_into<S: AsRef<str>>(&self, out: &mut String, name: &str, deps: &[S]) {
        match self {
            Fragment::Literal(text) => out.push_str(text),
            Fragment::Name | Fragment::Dependency(0) => out.push_str(name),
            Fragment::Dependency(n) => {
                if let Some(dep) = deps.get(n - 1) {
                    out.push_str(dep.as_ref());
                }
            }
            Fragment::Dependencies => {
                for dep in deps {
                    out.push_str(dep.as_ref());
                    out.push(' ');
                }
            }
        }
    }
}

/// A command template made of [`Fragment`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    fragments: Vec<Fragment>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the macro form described in the [module docs](self).
    pub fn parse(source: &str) -> Self {
        let mut template = Template::new();
        for token in Scanner::new(source) {
            template = match token {
                Token::Char(c) => template.push_char(c),
                Token::Fragment(fragment) => template.push(fragment),
            };
        }
        template
    }

    pub fn literal(self, text: impl AsRef<str>) -> Self {
        let text = text.as_ref();
        if text.is_empty() {
            return self;
        }
        text.chars().fold(self, Template::push_char)
    }

    pub fn name(self) -> Self {
        self.push(Fragment::Name)
    }

    /// Appends the dependency at the 1-based `position`.
    pub fn dependency(self, position: usize) -> Self {
        self.push(Fragment::Dependency(position))
    }

    pub fn dependencies(self) -> Self {
        self.push(Fragment::Dependencies)
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// True if the template has nothing to render.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Renders the template for target `name` with dependencies `deps`.
    pub fn render<S: AsRef<str>>(&self, name: &str, deps: &[S]) -> String {
        let mut out = String::new();
        for fragment in &self.fragments {
            fragment.render_into(&mut out, name, deps);
        }
        out
    }

    fn push(mut self, fragment: Fragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    fn push_char(mut self, c: char) -> Self {
        match self.fragments.last_mut() {
            Some(Fragment::Literal(text)) => text.push(c),
            _ => self.fragments.push(Fragment::Literal(c.to_string())),
        }
        self
    }
}

impl From<&str> for Template {
    fn from(source: &str) -> Self {
        Template::parse(source)
    }
}

impl From<String> for Template {
    fn from(source: String) -> Self {
        Template::parse(&source)
    }
}

impl std::fmt::Display for Template {
    /// Writes the template back in macro form. Positional dependencies past
    /// the first have no macro token and are shown as `${n}`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for fragment in &self.fragments {
            match fragment {
                Fragment::Literal(text) => {
                    for c in text.chars() {
                        if c == MARKER {
                            f.write_char(ESCAPE)?;
                        }
                        f.write_char(c)?;
                    }
                }
                Fragment::Name | Fragment::Dependency(0) => f.write_str("$@")?,
                Fragment::Dependency(1) => f.write_str("$<")?,
                Fragment::Dependency(n) => write!(f, "${{{n}}}")?,
                Fragment::Dependencies => f.write_str("$^")?,
            }
        }
        Ok(())
    }
}

/// Expands a macro-form command directly, without building a [`Template`].
///
/// Produces the same string as `Template::parse(source).render(name, deps)`.
pub fn expand<S: AsRef<str>>(source: &str, name: &str, deps: &[S]) -> String {
    let mut out = String::with_capacity(source.len());
    for token in Scanner::new(source) {
        match token {
            Token::Char(c) => out.push(c),
            Token::Fragment(fragment) => fragment.render_into(&mut out, name, deps),
        }
    }
    out
}

enum Token {
    Char(char),
    Fragment(Fragment),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    Marker,
}

/// Two-state scanner over the macro form: plain text, or just after a `$`.
struct Scanner<'a> {
    chars: Peekable<Chars<'a>>,
    state: State,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            state: State::Text,
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        match self.state {
            State::Text => {
                let c = self.chars.next()?;
                if c == ESCAPE && self.chars.peek() == Some(&MARKER) {
                    self.chars.next();
                    return Some(Token::Char(MARKER));
                }
                if c == MARKER {
                    self.state = State::Marker;
                    return self.next();
                }
                Some(Token::Char(c))
            }
            State::Marker => {
                let fragment = match self.chars.peek() {
                    Some('@') => Fragment::Name,
                    Some('<') => Fragment::Dependency(1),
                    Some('^') => Fragment::Dependencies,
                    // `$$` emits the first marker and stays after a marker.
                    Some(&MARKER) => {
                        self.chars.next();
                        return Some(Token::Char(MARKER));
                    }
                    _ => {
                        self.state = State::Text;
                        return Some(Token::Char(MARKER));
                    }
                };
                self.chars.next();
                self.state = State::Text;
                Some(Token::Fragment(fragment))
            }
        }
    }
}
