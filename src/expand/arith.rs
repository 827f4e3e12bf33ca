//! Arithmetic expansion
//!
//! C-like integer expressions over `i64` with shell variables as
//! identifiers: the full operator ladder (comma, assignments, ternary,
//! logical, bitwise, comparison, shift, additive, multiplicative, `**`,
//! unary, pre/post increment), parentheses, and literals in decimal,
//! hex, octal, and explicit `base#value` notation. A variable's value is
//! itself evaluated as an expression, so `x=1+2; echo $((x*2))` prints 6.
//!
//! Short-circuited operands are parsed in a no-eval mode: they must be
//! syntactically valid but produce no reads, writes, or errors.

use crate::expand::ExpandError;
use crate::shell::Shell;
use crate::var::Subscript;

/// Guard against `x=x` style self-referential values.
const MAX_RECURSION: u32 = 64;

pub fn eval_arith(shell: &mut Shell, text: &str) -> Result<i64, ExpandError> {
    eval_arith_depth(shell, text, 0)
}

fn eval_arith_depth(shell: &mut Shell, text: &str, depth: u32) -> Result<i64, ExpandError> {
    if depth > MAX_RECURSION {
        return Err(ExpandError::Arith(format!(
            "expression recursion level exceeded: {text}"
        )));
    }
    let mut p = ArithParser {
        chars: text.chars().collect(),
        pos: 0,
        shell,
        depth,
        no_eval: 0,
    };
    p.skip_ws();
    if p.at_end() {
        // An empty expression evaluates to zero.
        return Ok(0);
    }
    let value = p.comma()?;
    p.skip_ws();
    if !p.at_end() {
        return Err(p.syntax_error());
    }
    Ok(value)
}

struct ArithParser<'a> {
    chars: Vec<char>,
    pos: usize,
    shell: &'a mut Shell,
    depth: u32,
    /// When non-zero, parse without evaluating side effects.
    no_eval: u32,
}

/// An assignable place: a variable or one array element. The subscript
/// is kept as text and evaluated once, when the lvalue is resolved.
struct Lvalue {
    name: String,
    index_text: Option<String>,
}

/// An lvalue with its subscript evaluated.
struct Place {
    name: String,
    index: Option<i64>,
}

impl ArithParser<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    /// Consume `tok` if present (checking it is not a longer operator).
    fn eat(&mut self, tok: &str) -> bool {
        self.skip_ws();
        let mut i = self.pos;
        for c in tok.chars() {
            if self.chars.get(i) != Some(&c) {
                return false;
            }
            i += 1;
        }
        // Reject when the operator continues: `<` vs `<=`, `=` vs `==`.
        let next = self.chars.get(i).copied();
        let conflict = match tok {
            "<" | ">" => matches!(next, Some('=') | Some('<') | Some('>')),
            "=" | "!" => next == Some('='),
            "&" => next == Some('&'),
            "|" => next == Some('|'),
            "*" => next == Some('*') || next == Some('='),
            "+" => matches!(next, Some('+') | Some('=')),
            "-" => matches!(next, Some('-') | Some('=')),
            "/" | "%" | "^" => next == Some('='),
            "<<" | ">>" => next == Some('='),
            _ => false,
        };
        if conflict {
            return false;
        }
        self.pos = i;
        true
    }

    fn syntax_error(&self) -> ExpandError {
        let text: String = self.chars.iter().collect();
        ExpandError::Arith(format!("syntax error in expression: {text}"))
    }

    // --- precedence ladder -------------------------------------------------

    fn comma(&mut self) -> Result<i64, ExpandError> {
        let mut value = self.assignment()?;
        while self.eat(",") {
            value = self.assignment()?;
        }
        Ok(value)
    }

    fn assignment(&mut self) -> Result<i64, ExpandError> {
        let save = self.pos;
        if let Some(lv) = self.try_lvalue() {
            self.skip_ws();
            for (tok, op) in [
                ("=", None),
                ("+=", Some('+')),
                ("-=", Some('-')),
                ("*=", Some('*')),
                ("/=", Some('/')),
                ("%=", Some('%')),
                ("<<=", Some('<')),
                (">>=", Some('>')),
                ("&=", Some('&')),
                ("^=", Some('^')),
                ("|=", Some('|')),
            ] {
                if self.eat(tok) {
                    let place = self.resolve(&lv)?;
                    let rhs = self.assignment()?;
                    let value = match op {
                        None => rhs,
                        Some(op) => {
                            let old = self.read_place(&place)?;
                            self.binary_op(old, op, rhs)?
                        }
                    };
                    self.write_place(&place, value)?;
                    return Ok(value);
                }
            }
        }
        self.pos = save;
        self.ternary()
    }

    fn ternary(&mut self) -> Result<i64, ExpandError> {
        let cond = self.logical_or()?;
        if !self.eat("?") {
            return Ok(cond);
        }
        let then_value = self.branch(cond != 0, Self::assignment)?;
        self.skip_ws();
        if !self.eat(":") {
            return Err(self.syntax_error());
        }
        let else_value = self.branch(cond == 0, Self::ternary)?;
        Ok(if cond != 0 { then_value } else { else_value })
    }

    fn logical_or(&mut self) -> Result<i64, ExpandError> {
        let mut value = self.logical_and()?;
        while self.eat("||") {
            let rhs = self.branch(value == 0, Self::logical_and)?;
            value = i64::from(value != 0 || rhs != 0);
        }
        Ok(value)
    }

    fn logical_and(&mut self) -> Result<i64, ExpandError> {
        let mut value = self.bit_or()?;
        while self.eat("&&") {
            let rhs = self.branch(value != 0, Self::bit_or)?;
            value = i64::from(value != 0 && rhs != 0);
        }
        Ok(value)
    }

    /// Parse a conditionally-evaluated operand.
    fn branch(
        &mut self,
        live: bool,
        f: impl Fn(&mut Self) -> Result<i64, ExpandError>,
    ) -> Result<i64, ExpandError> {
        if live {
            f(self)
        } else {
            self.no_eval += 1;
            let r = f(self);
            self.no_eval -= 1;
            r
        }
    }

    fn bit_or(&mut self) -> Result<i64, ExpandError> {
        let mut value = self.bit_xor()?;
        while self.eat("|") {
            value |= self.bit_xor()?;
        }
        Ok(value)
    }

    fn bit_xor(&mut self) -> Result<i64, ExpandError> {
        let mut value = self.bit_and()?;
        while self.eat("^") {
            value ^= self.bit_and()?;
        }
        Ok(value)
    }

    fn bit_and(&mut self) -> Result<i64, ExpandError> {
        let mut value = self.equality()?;
        while self.eat("&") {
            value &= self.equality()?;
        }
        Ok(value)
    }

    fn equality(&mut self) -> Result<i64, ExpandError> {
        let mut value = self.relational()?;
        loop {
            if self.eat("==") {
                value = i64::from(value == self.relational()?);
            } else if self.eat("!=") {
                value = i64::from(value != self.relational()?);
            } else {
                return Ok(value);
            }
        }
    }

    fn relational(&mut self) -> Result<i64, ExpandError> {
        let mut value = self.shift()?;
        loop {
            if self.eat("<=") {
                value = i64::from(value <= self.shift()?);
            } else if self.eat(">=") {
                value = i64::from(value >= self.shift()?);
            } else if self.eat("<") {
                value = i64::from(value < self.shift()?);
            } else if self.eat(">") {
                value = i64::from(value > self.shift()?);
            } else {
                return Ok(value);
            }
        }
    }

    fn shift(&mut self) -> Result<i64, ExpandError> {
        let mut value = self.additive()?;
        loop {
            if self.eat("<<") {
                value = value.wrapping_shl(self.additive()? as u32);
            } else if self.eat(">>") {
                value = value.wrapping_shr(self.additive()? as u32);
            } else {
                return Ok(value);
            }
        }
    }

    fn additive(&mut self) -> Result<i64, ExpandError> {
        let mut value = self.multiplicative()?;
        loop {
            if self.eat("+") {
                value = value.wrapping_add(self.multiplicative()?);
            } else if self.eat("-") {
                value = value.wrapping_sub(self.multiplicative()?);
            } else {
                return Ok(value);
            }
        }
    }

    fn multiplicative(&mut self) -> Result<i64, ExpandError> {
        let mut value = self.power()?;
        loop {
            if self.eat("*") {
                value = value.wrapping_mul(self.power()?);
            } else if self.eat("/") {
                let rhs = self.power()?;
                value = self.binary_op(value, '/', rhs)?;
            } else if self.eat("%") {
                let rhs = self.power()?;
                value = self.binary_op(value, '%', rhs)?;
            } else {
                return Ok(value);
            }
        }
    }

    fn power(&mut self) -> Result<i64, ExpandError> {
        let base = self.unary()?;
        if self.eat("**") {
            // Right associative.
            let exp = self.power()?;
            if exp < 0 {
                if self.no_eval > 0 {
                    return Ok(0);
                }
                return Err(ExpandError::Arith("exponent less than 0".into()));
            }
            let mut result: i64 = 1;
            for _ in 0..exp {
                result = result.wrapping_mul(base);
            }
            return Ok(result);
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<i64, ExpandError> {
        self.skip_ws();
        if self.eat("++") {
            let place = self.require_place()?;
            let value = self.read_place(&place)?.wrapping_add(1);
            self.write_place(&place, value)?;
            return Ok(value);
        }
        if self.eat("--") {
            let place = self.require_place()?;
            let value = self.read_place(&place)?.wrapping_sub(1);
            self.write_place(&place, value)?;
            return Ok(value);
        }
        if self.eat("!") {
            return Ok(i64::from(self.unary()? == 0));
        }
        if self.eat("~") {
            return Ok(!self.unary()?);
        }
        if self.eat("-") {
            return Ok(self.unary()?.wrapping_neg());
        }
        if self.eat("+") {
            return self.unary();
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<i64, ExpandError> {
        self.skip_ws();
        match self.peek() {
            Some('(') => {
                self.bump();
                let value = self.comma()?;
                self.skip_ws();
                if self.bump() != Some(')') {
                    return Err(self.syntax_error());
                }
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() => self.number(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let place = self.require_place()?;
                // Postfix increment/decrement bind to the identifier.
                if self.eat("++") {
                    let value = self.read_place(&place)?;
                    self.write_place(&place, value.wrapping_add(1))?;
                    return Ok(value);
                }
                if self.eat("--") {
                    let value = self.read_place(&place)?;
                    self.write_place(&place, value.wrapping_sub(1))?;
                    return Ok(value);
                }
                self.read_place(&place)
            }
            _ => Err(self.syntax_error()),
        }
    }

    fn number(&mut self) -> Result<i64, ExpandError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '#' || c == '@' || c == '_')
        {
            self.bump();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        parse_number(&text).ok_or_else(|| {
            ExpandError::Arith(format!("invalid arithmetic constant: {text}"))
        })
    }

    // --- lvalues -----------------------------------------------------------

    /// Try to parse `name` or `name[text]`; restores position when the
    /// input is not an lvalue. The subscript is captured textually so it
    /// is evaluated exactly once, by `resolve`.
    fn try_lvalue(&mut self) -> Option<Lvalue> {
        self.skip_ws();
        let save = self.pos;
        let mut name = String::new();
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                name.push(c);
                self.bump();
            }
            _ => return None,
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            name.push(self.bump().unwrap());
        }
        let index_text = if self.peek() == Some('[') {
            self.bump();
            let start = self.pos;
            let mut depth = 1usize;
            loop {
                match self.bump() {
                    Some('[') => depth += 1,
                    Some(']') => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    Some(_) => {}
                    None => {
                        self.pos = save;
                        return None;
                    }
                }
            }
            Some(self.chars[start..self.pos - 1].iter().collect())
        } else {
            None
        };
        Some(Lvalue { name, index_text })
    }

    /// Evaluate the subscript, if any.
    fn resolve(&mut self, lv: &Lvalue) -> Result<Place, ExpandError> {
        let index = match &lv.index_text {
            None => None,
            Some(_) if self.no_eval > 0 => Some(0),
            Some(text) => Some(eval_arith_depth(self.shell, text, self.depth + 1)?),
        };
        Ok(Place {
            name: lv.name.clone(),
            index,
        })
    }

    fn require_place(&mut self) -> Result<Place, ExpandError> {
        match self.try_lvalue() {
            Some(lv) => self.resolve(&lv),
            None => Err(self.syntax_error()),
        }
    }

    fn read_place(&mut self, place: &Place) -> Result<i64, ExpandError> {
        if self.no_eval > 0 {
            return Ok(0);
        }
        let raw: Option<String> = match place.index {
            None => self
                .shell
                .dynamic
                .get(&place.name)
                .or_else(|| self.shell.vars.get_scalar(&place.name).map(str::to_string)),
            Some(i) => match self
                .shell
                .vars
                .get(&place.name)
                .and_then(|v| v.value.as_ref())
            {
                Some(crate::var::Value::Indexed(v)) => {
                    if i < 0 {
                        None
                    } else {
                        v.get(i as usize).and_then(|e| e.clone())
                    }
                }
                Some(crate::var::Value::Assoc(m)) => m.get(&i.to_string()).cloned(),
                Some(crate::var::Value::Scalar(s)) if i == 0 => Some(s.clone()),
                _ => None,
            },
        };
        match raw {
            None => Ok(0),
            Some(s) => {
                let s = s.trim();
                if s.is_empty() {
                    Ok(0)
                } else if let Some(n) = parse_number(s) {
                    Ok(n)
                } else {
                    eval_arith_depth(self.shell, s, self.depth + 1)
                }
            }
        }
    }

    fn write_place(&mut self, place: &Place, value: i64) -> Result<(), ExpandError> {
        if self.no_eval > 0 {
            return Ok(());
        }
        let result = match place.index {
            None => self
                .shell
                .vars
                .set_scalar(&place.name, value.to_string(), false),
            Some(i) => self.shell.vars.set_element(
                &place.name,
                Subscript::Index(i),
                value.to_string(),
                false,
            ),
        };
        result.map_err(|e| ExpandError::Arith(e.to_string()))
    }

    fn binary_op(&self, lhs: i64, op: char, rhs: i64) -> Result<i64, ExpandError> {
        Ok(match op {
            '+' => lhs.wrapping_add(rhs),
            '-' => lhs.wrapping_sub(rhs),
            '*' => lhs.wrapping_mul(rhs),
            '/' | '%' => {
                if rhs == 0 {
                    if self.no_eval > 0 {
                        return Ok(0);
                    }
                    return Err(ExpandError::Arith("division by 0".into()));
                }
                if op == '/' {
                    lhs.wrapping_div(rhs)
                } else {
                    lhs.wrapping_rem(rhs)
                }
            }
            '<' => lhs.wrapping_shl(rhs as u32),
            '>' => lhs.wrapping_shr(rhs as u32),
            '&' => lhs & rhs,
            '^' => lhs ^ rhs,
            '|' => lhs | rhs,
            _ => unreachable!("unknown binary operator"),
        })
    }
}

/// Parse a numeric literal: decimal, `0x` hex, leading-zero octal, or
/// `base#value` with bases 2-64 (digits, `a-z`, `A-Z`, `@`, `_`).
fn parse_number(s: &str) -> Option<i64> {
    if let Some((base, digits)) = s.split_once('#') {
        let base: u32 = base.parse().ok()?;
        if !(2..=64).contains(&base) || digits.is_empty() {
            return None;
        }
        let mut n: i64 = 0;
        for c in digits.chars() {
            let d = match c {
                '0'..='9' => c as u32 - '0' as u32,
                'a'..='z' => c as u32 - 'a' as u32 + 10,
                'A'..='Z' => c as u32 - 'A' as u32 + 36,
                '@' => 62,
                '_' => 63,
                _ => return None,
            };
            // Bases up to 36 accept uppercase as lowercase digits.
            let d = if base <= 36 && (36..62).contains(&d) {
                d - 26
            } else {
                d
            };
            if d >= base {
                return None;
            }
            n = n.checked_mul(base as i64)?.checked_add(d as i64)?;
        }
        return Some(n);
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if s.len() > 1 && s.starts_with('0') {
        return i64::from_str_radix(&s[1..], 8).ok();
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::ShellOptions;

    fn eval(text: &str) -> i64 {
        let mut shell = Shell::new(ShellOptions::default());
        eval_arith(&mut shell, text).unwrap()
    }

    #[test]
    fn precedence_and_parentheses() {
        assert_eq!(eval("1 + 2 * 3"), 7);
        assert_eq!(eval("(1 + 2) * 3"), 9);
        assert_eq!(eval("2 ** 10"), 1024);
        assert_eq!(eval("2 ** 3 ** 2"), 512); // right associative
        assert_eq!(eval("7 % 3"), 1);
        assert_eq!(eval("1 << 4 | 1"), 17);
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(eval("3 < 5"), 1);
        assert_eq!(eval("3 >= 5"), 0);
        assert_eq!(eval("1 && 0"), 0);
        assert_eq!(eval("1 || 0"), 1);
        assert_eq!(eval("!5"), 0);
        assert_eq!(eval("~0"), -1);
        assert_eq!(eval("1 ? 10 : 20"), 10);
        assert_eq!(eval("0 ? 10 : 20"), 20);
    }

    #[test]
    fn number_bases() {
        assert_eq!(eval("0x1f"), 31);
        assert_eq!(eval("010"), 8);
        assert_eq!(eval("2#1010"), 10);
        assert_eq!(eval("16#ff"), 255);
        assert_eq!(eval("36#z"), 35);
    }

    #[test]
    fn variables_and_assignment() {
        let mut shell = Shell::new(ShellOptions::default());
        shell.vars.set_scalar("x", "5", false).unwrap();
        assert_eq!(eval_arith(&mut shell, "x * 2").unwrap(), 10);
        assert_eq!(eval_arith(&mut shell, "y = x + 1").unwrap(), 6);
        assert_eq!(shell.vars.get_scalar("y"), Some("6"));
        assert_eq!(eval_arith(&mut shell, "y += 4").unwrap(), 10);
        // Unset variables read as zero.
        assert_eq!(eval_arith(&mut shell, "nosuch + 1").unwrap(), 1);
    }

    #[test]
    fn variable_values_are_expressions() {
        let mut shell = Shell::new(ShellOptions::default());
        shell.vars.set_scalar("x", "1+2", false).unwrap();
        assert_eq!(eval_arith(&mut shell, "x * 2").unwrap(), 6);
    }

    #[test]
    fn increments() {
        let mut shell = Shell::new(ShellOptions::default());
        shell.vars.set_scalar("i", "5", false).unwrap();
        assert_eq!(eval_arith(&mut shell, "i++").unwrap(), 5);
        assert_eq!(shell.vars.get_scalar("i"), Some("6"));
        assert_eq!(eval_arith(&mut shell, "++i").unwrap(), 7);
        assert_eq!(eval_arith(&mut shell, "i--, i").unwrap(), 6);
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let mut shell = Shell::new(ShellOptions::default());
        assert!(eval_arith(&mut shell, "1 / 0").is_err());
        assert!(eval_arith(&mut shell, "1 % 0").is_err());
        // Short-circuit protects the dead branch.
        assert_eq!(eval_arith(&mut shell, "0 && 1 / 0").unwrap(), 0);
        assert_eq!(eval_arith(&mut shell, "1 ? 5 : 1 / 0").unwrap(), 5);
    }

    #[test]
    fn short_circuit_skips_side_effects() {
        let mut shell = Shell::new(ShellOptions::default());
        assert_eq!(eval_arith(&mut shell, "0 && (x = 9)").unwrap(), 0);
        assert_eq!(shell.vars.get_scalar("x"), None);
        assert_eq!(eval_arith(&mut shell, "1 || (x = 9)").unwrap(), 1);
        assert_eq!(shell.vars.get_scalar("x"), None);
    }

    #[test]
    fn array_elements() {
        let mut shell = Shell::new(ShellOptions::default());
        shell
            .vars
            .set_array("a", vec!["10".into(), "20".into()])
            .unwrap();
        assert_eq!(eval_arith(&mut shell, "a[1] + 1").unwrap(), 21);
        assert_eq!(eval_arith(&mut shell, "a[2] = a[0] + a[1]").unwrap(), 30);
    }

    #[test]
    fn empty_expression_is_zero() {
        assert_eq!(eval(""), 0);
        assert_eq!(eval("  "), 0);
    }
}
