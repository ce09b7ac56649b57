//! Tokenizer for `{{random.KIND(args)}}` placeholders.
//!
//! A template string is scanned once, left to right, into literal text and
//! parsed generator tokens. Anything that looks like a placeholder but does not
//! parse (unknown kind, bad arguments, missing `}}`) is kept as literal text.

use crate::generate;
use crate::value::VarValue;
use rand::Rng;

const OPEN: &str = "{{random.";
const CLOSE: &str = "}}";

/// Default length of `random.string`.
pub const DEFAULT_STRING_LEN: usize = 10;
/// Longest `random.string` accepted; longer requests stay literal text.
pub const MAX_STRING_LEN: usize = 64 * 1024;
/// Default inclusive range of `random.int` / `random.number`.
pub const DEFAULT_INT_RANGE: (i64, i64) = (1, 1000);
/// Default half-open range of `random.float`.
pub const DEFAULT_FLOAT_RANGE: (f64, f64) = (0.0, 100.0);

/// A parsed placeholder generator with its typed arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Generator {
    /// Alphanumeric string of exactly `len` characters.
    String { len: usize },
    /// Integer in `[min, max]`. `random.number` is an alias.
    Int { min: i64, max: i64 },
    /// Float in `[min, max)`.
    Float { min: f64, max: f64 },
    Uuid,
    Email,
    Name,
    /// RFC 3339 instant within the trailing 30 days.
    Timestamp,
    /// One of the listed options, whitespace-trimmed.
    Choice(Vec<String>),
}

impl Generator {
    /// Parse the inside of a placeholder, e.g. `int(1,5)` or `uuid`.
    pub fn parse(body: &str) -> Option<Self> {
        let (kind, args) = match body.split_once('(') {
            Some((kind, rest)) => (kind, Some(rest.strip_suffix(')')?)),
            None => (body, None),
        };
        let args = args.filter(|a| !a.trim().is_empty());

        match kind {
            "string" => {
                let len = match args {
                    Some(a) => a.trim().parse().ok()?,
                    None => DEFAULT_STRING_LEN,
                };
                if len > MAX_STRING_LEN {
                    return None;
                }
                Some(Generator::String { len })
            }
            "int" | "number" => {
                let (min, max) = match args {
                    Some(a) => parse_pair::<i64>(a)?,
                    None => DEFAULT_INT_RANGE,
                };
                Some(Generator::Int {
                    min: min.min(max),
                    max: max.max(min),
                })
            }
            "float" => {
                let (min, max) = match args {
                    Some(a) => parse_pair::<f64>(a)?,
                    None => DEFAULT_FLOAT_RANGE,
                };
                // The width must be representable for a uniform draw.
                if !(max - min).abs().is_finite() {
                    return None;
                }
                Some(Generator::Float {
                    min: min.min(max),
                    max: max.max(min),
                })
            }
            "uuid" if args.is_none() => Some(Generator::Uuid),
            "email" if args.is_none() => Some(Generator::Email),
            "name" if args.is_none() => Some(Generator::Name),
            "timestamp" if args.is_none() => Some(Generator::Timestamp),
            "choice" => {
                let options = args?.split(',').map(|s| s.trim().to_string()).collect();
                Some(Generator::Choice(options))
            }
            _ => None,
        }
    }

    /// True for generators whose output is a number.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Generator::Int { .. } | Generator::Float { .. })
    }

    /// Draw one value.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> VarValue {
        match self {
            Generator::String { len } => VarValue::String(generate::alphanumeric(rng, *len)),
            Generator::Int { min, max } => VarValue::Int(rng.gen_range(*min..=*max)),
            Generator::Float { min, max } => VarValue::Float(generate::float_in(rng, *min, *max)),
            Generator::Uuid => VarValue::String(generate::uuid_v4(rng)),
            Generator::Email => VarValue::String(generate::email(rng)),
            Generator::Name => VarValue::String(generate::full_name(rng)),
            Generator::Timestamp => VarValue::String(generate::recent_timestamp(rng)),
            Generator::Choice(options) => VarValue::String(generate::choice(rng, options)),
        }
    }
}

fn parse_pair<T: std::str::FromStr>(args: &str) -> Option<(T, T)> {
    let (a, b) = args.split_once(',')?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

/// One piece of a scanned template string.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Literal(String),
    Token(Generator),
}

/// A template string parsed once and rendered many times.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(text: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = text;

        while let Some(start) = rest.find(OPEN) {
            literal.push_str(&rest[..start]);
            let after_open = &rest[start + OPEN.len()..];

            let parsed = after_open
                .find(CLOSE)
                .and_then(|end| Generator::parse(&after_open[..end]).map(|g| (g, end)));

            match parsed {
                Some((generator, end)) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Token(generator));
                    rest = &after_open[end + CLOSE.len()..];
                }
                None => {
                    // Not a placeholder; keep the braces and rescan after them.
                    literal.push_str("{{");
                    rest = &rest[start + 2..];
                }
            }
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn has_tokens(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Token(_)))
    }

    /// Render to a leaf value.
    ///
    /// A template that is exactly one numeric token yields a number: `Int`
    /// when the draw has no fractional part, `Float` otherwise. Everything
    /// else yields a string.
    pub fn render<R: Rng + ?Sized>(&self, rng: &mut R) -> VarValue {
        if let [Segment::Token(generator)] = self.segments.as_slice() {
            if generator.is_numeric() {
                return coerce_numeric(generator.generate(rng));
            }
        }
        VarValue::String(self.render_string(rng))
    }

    /// Render to text, substituting every token with a fresh draw.
    pub fn render_string<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(generator) => match generator.generate(rng) {
                    VarValue::String(s) => out.push_str(&s),
                    VarValue::Int(i) => out.push_str(&i.to_string()),
                    VarValue::Float(f) => out.push_str(&f.to_string()),
                    other => unreachable!("generator produced non-scalar {other:?}"),
                },
            }
        }
        out
    }
}

fn coerce_numeric(value: VarValue) -> VarValue {
    match value {
        VarValue::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            VarValue::Int(f as i64)
        }
        other => other,
    }
}
