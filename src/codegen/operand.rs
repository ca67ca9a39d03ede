use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Frame {
    Global,
    Local,
    Temporary,
}

impl Frame {
    fn prefix(self) -> &'static str {
        match self {
            Frame::Global => "GF",
            Frame::Local => "LF",
            Frame::Temporary => "TF",
        }
    }
}

/// An instruction argument: a frame variable or a typed immediate.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Var(Frame, String),
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Nil,
}

impl Operand {
    pub fn var(frame: Frame, name: impl Into<String>) -> Self {
        Operand::Var(frame, name.into())
    }

    pub fn retval() -> Self {
        Operand::var(Frame::Temporary, "%retval")
    }

    pub fn is_immediate(&self) -> bool {
        !matches!(self, Operand::Var(..))
    }
}

/// C99 `%a` rendering of a double.
pub fn hex_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    let sign = if value.is_sign_negative() { "-" } else { "" };
    if value.is_infinite() {
        return format!("{}inf", sign);
    }

    let bits = value.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i64;
    let mantissa = bits & ((1u64 << 52) - 1);
    if biased == 0 && mantissa == 0 {
        return format!("{}0x0p+0", sign);
    }
    let (lead, exponent) = if biased == 0 {
        (0, -1022)
    } else {
        (1, biased - 1023)
    };

    let digits = format!("{:013x}", mantissa);
    let digits = digits.trim_end_matches('0');
    if digits.is_empty() {
        format!("{}0x{}p{:+}", sign, lead, exponent)
    } else {
        format!("{}0x{}.{}p{:+}", sign, lead, digits, exponent)
    }
}

/// Escapes control characters, space, `#` and `\` as `\ddd`.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if (c as u32) <= 32 || c == '#' || c == '\\' {
            out.push_str(&format!("\\{:03}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Var(frame, name) => write!(f, "{}@{}", frame.prefix(), name),
            Operand::Int(i) => write!(f, "int@{}", i),
            Operand::Float(x) => write!(f, "float@{}", hex_float(*x)),
            Operand::Str(s) => write!(f, "string@{}", escape_string(s)),
            Operand::Bool(b) => write!(f, "bool@{}", b),
            Operand::Nil => write!(f, "nil@nil"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_floats() {
        assert_eq!(hex_float(1.0), "0x1p+0");
        assert_eq!(hex_float(1.5), "0x1.8p+0");
        assert_eq!(hex_float(0.5), "0x1p-1");
        assert_eq!(hex_float(-2.0), "-0x1p+1");
        assert_eq!(hex_float(0.0), "0x0p+0");
        assert_eq!(hex_float(1e6), "0x1.e848p+19");
        assert_eq!(hex_float(0.1), "0x1.999999999999ap-4");
    }

    #[test]
    fn operands() {
        assert_eq!(Operand::var(Frame::Global, "x").to_string(), "GF@x");
        assert_eq!(Operand::retval().to_string(), "TF@%retval");
        assert_eq!(Operand::Int(-3).to_string(), "int@-3");
        assert_eq!(Operand::Bool(true).to_string(), "bool@true");
        assert_eq!(Operand::Nil.to_string(), "nil@nil");
        assert_eq!(
            Operand::Str("a b#\\\n".into()).to_string(),
            "string@a\\032b\\035\\092\\010"
        );
    }
}
