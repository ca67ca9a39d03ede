use crate::error::ErrorKind;

/// Support routines appended after the user code when the program uses them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Routine {
    Readi,
    Readf,
    Reads,
    Write,
    Strlen,
    Ord,
    Chr,
    Substring,
    Intval,
    Floatval,
    Strval,
    ToInt,
    ToFloat,
    ToString,
    ToBool,
    ToNumber,
    TypeError,
}

impl Routine {
    /// The routine backing a built-in function.
    pub fn builtin(name: &str) -> Option<Routine> {
        let routine = match name {
            "readi" => Routine::Readi,
            "readf" => Routine::Readf,
            "reads" => Routine::Reads,
            "write" => Routine::Write,
            "strlen" => Routine::Strlen,
            "ord" => Routine::Ord,
            "chr" => Routine::Chr,
            "substring" => Routine::Substring,
            "intval" => Routine::Intval,
            "floatval" => Routine::Floatval,
            "strval" => Routine::Strval,
            _ => return None,
        };
        Some(routine)
    }

    pub fn label(self) -> &'static str {
        match self {
            Routine::Readi => "readi",
            Routine::Readf => "readf",
            Routine::Reads => "reads",
            Routine::Write => "write",
            Routine::Strlen => "strlen",
            Routine::Ord => "ord",
            Routine::Chr => "chr",
            Routine::Substring => "substring",
            Routine::Intval => "intval",
            Routine::Floatval => "floatval",
            Routine::Strval => "strval",
            Routine::ToInt => "%toint",
            Routine::ToFloat => "%tofloat",
            Routine::ToString => "%tostring",
            Routine::ToBool => "%tobool",
            Routine::ToNumber => "%tonumber",
            Routine::TypeError => "%type_error",
        }
    }

    pub fn dependencies(self) -> &'static [Routine] {
        match self {
            Routine::Readi | Routine::Readf | Routine::Reads => &[],
            Routine::Write | Routine::ToBool | Routine::TypeError => &[],
            _ => &[Routine::TypeError],
        }
    }

    /// Instruction text of the routine, one instruction per line.
    pub fn body(self) -> String {
        match self {
            Routine::Readi => read("readi", "int"),
            Routine::Readf => read("readf", "float"),
            Routine::Reads => read("reads", "string"),
            Routine::Write => WRITE.to_string(),
            Routine::Strlen => STRLEN.to_string(),
            Routine::Ord => ORD.to_string(),
            Routine::Chr => CHR.to_string(),
            Routine::Substring => SUBSTRING.to_string(),
            Routine::Intval => to_int("intval"),
            Routine::Floatval => to_float("floatval"),
            Routine::Strval => to_string("strval"),
            Routine::ToInt => to_int("%toint"),
            Routine::ToFloat => to_float("%tofloat"),
            Routine::ToString => to_string("%tostring"),
            Routine::ToBool => TO_BOOL.to_string(),
            Routine::ToNumber => TO_NUMBER.to_string(),
            Routine::TypeError => format!(
                "LABEL %type_error\nEXIT int@{}\n",
                ErrorKind::Type.exit_code()
            ),
        }
    }
}

/// Prefix for labels inside a routine; `%` keeps them out of the user's
/// function namespace.
fn local_prefix(label: &str) -> String {
    format!("%{}", label.trim_start_matches('%'))
}

fn read(label: &str, ty: &str) -> String {
    format!(
        "LABEL {label}
PUSHFRAME
DEFVAR LF@%retval
READ LF@%retval {ty}
POPFRAME
RETURN
"
    )
}

const WRITE: &str = "LABEL write
PUSHFRAME
DEFVAR LF@%retval
MOVE LF@%retval nil@nil
DEFVAR LF@count
DEFVAR LF@value
POPS LF@count
JUMPIFEQ %write_end LF@count int@0
POPS LF@value
SUB LF@count LF@count int@1
PUSHS LF@count
CREATEFRAME
CALL write
WRITE LF@value
LABEL %write_end
POPFRAME
RETURN
";

const STRLEN: &str = "LABEL strlen
PUSHFRAME
DEFVAR LF@%retval
DEFVAR LF@s
DEFVAR LF@type
POPS LF@s
TYPE LF@type LF@s
JUMPIFNEQ %type_error LF@type string@string
STRLEN LF@%retval LF@s
POPFRAME
RETURN
";

const ORD: &str = "LABEL ord
PUSHFRAME
DEFVAR LF@%retval
MOVE LF@%retval int@0
DEFVAR LF@s
DEFVAR LF@type
POPS LF@s
TYPE LF@type LF@s
JUMPIFNEQ %type_error LF@type string@string
JUMPIFEQ %ord_end LF@s string@
STRI2INT LF@%retval LF@s int@0
LABEL %ord_end
POPFRAME
RETURN
";

const CHR: &str = "LABEL chr
PUSHFRAME
DEFVAR LF@%retval
MOVE LF@%retval nil@nil
DEFVAR LF@i
DEFVAR LF@type
DEFVAR LF@bad
POPS LF@i
TYPE LF@type LF@i
JUMPIFNEQ %type_error LF@type string@int
LT LF@bad LF@i int@0
JUMPIFEQ %chr_end LF@bad bool@true
GT LF@bad LF@i int@255
JUMPIFEQ %chr_end LF@bad bool@true
INT2CHAR LF@%retval LF@i
LABEL %chr_end
POPFRAME
RETURN
";

const SUBSTRING: &str = "LABEL substring
PUSHFRAME
DEFVAR LF@%retval
MOVE LF@%retval nil@nil
DEFVAR LF@s
DEFVAR LF@i
DEFVAR LF@j
DEFVAR LF@len
DEFVAR LF@bad
DEFVAR LF@char
DEFVAR LF@type
POPS LF@j
POPS LF@i
POPS LF@s
TYPE LF@type LF@s
JUMPIFNEQ %type_error LF@type string@string
TYPE LF@type LF@i
JUMPIFNEQ %type_error LF@type string@int
TYPE LF@type LF@j
JUMPIFNEQ %type_error LF@type string@int
STRLEN LF@len LF@s
LT LF@bad LF@i int@1
JUMPIFEQ %substring_end LF@bad bool@true
GT LF@bad LF@i LF@j
JUMPIFEQ %substring_end LF@bad bool@true
GT LF@bad LF@j LF@len
JUMPIFEQ %substring_end LF@bad bool@true
MOVE LF@%retval string@
SUB LF@i LF@i int@1
LABEL %substring_loop
JUMPIFEQ %substring_end LF@i LF@j
GETCHAR LF@char LF@s LF@i
CONCAT LF@%retval LF@%retval LF@char
ADD LF@i LF@i int@1
JUMP %substring_loop
LABEL %substring_end
POPFRAME
RETURN
";

fn to_int(label: &str) -> String {
    let local = local_prefix(label);
    format!(
        "LABEL {label}
PUSHFRAME
DEFVAR LF@%retval
DEFVAR LF@value
DEFVAR LF@type
POPS LF@value
TYPE LF@type LF@value
MOVE LF@%retval int@0
JUMPIFEQ {local}_end LF@type string@nil
MOVE LF@%retval LF@value
JUMPIFEQ {local}_end LF@type string@int
JUMPIFNEQ %type_error LF@type string@float
FLOAT2INT LF@%retval LF@value
LABEL {local}_end
POPFRAME
RETURN
"
    )
}

fn to_float(label: &str) -> String {
    let local = local_prefix(label);
    format!(
        "LABEL {label}
PUSHFRAME
DEFVAR LF@%retval
DEFVAR LF@value
DEFVAR LF@type
POPS LF@value
TYPE LF@type LF@value
MOVE LF@%retval float@0x0p+0
JUMPIFEQ {local}_end LF@type string@nil
MOVE LF@%retval LF@value
JUMPIFEQ {local}_end LF@type string@float
JUMPIFNEQ %type_error LF@type string@int
INT2FLOAT LF@%retval LF@value
LABEL {local}_end
POPFRAME
RETURN
"
    )
}

/// Renders ints as decimal digits and floats as their integer part plus up
/// to six rounded fractional digits, trailing zeros dropped.
fn to_string(label: &str) -> String {
    let local = local_prefix(label);
    format!(
        "LABEL {label}
PUSHFRAME
DEFVAR LF@%retval
DEFVAR LF@value
DEFVAR LF@type
DEFVAR LF@digits
DEFVAR LF@digit
DEFVAR LF@char
DEFVAR LF@neg
DEFVAR LF@frac
DEFVAR LF@fracstr
DEFVAR LF@count
DEFVAR LF@tmp
POPS LF@value
TYPE LF@type LF@value
MOVE LF@%retval string@
MOVE LF@fracstr string@
JUMPIFEQ {local}_end LF@type string@nil
JUMPIFEQ {local}_int LF@type string@int
JUMPIFEQ {local}_float LF@type string@float
JUMPIFNEQ %type_error LF@type string@string
MOVE LF@%retval LF@value
JUMP {local}_end
LABEL {local}_int
MOVE LF@digits LF@value
LT LF@neg LF@digits int@0
JUMPIFEQ {local}_int_abs LF@neg bool@false
SUB LF@digits int@0 LF@digits
LABEL {local}_int_abs
MOVE LF@frac int@0
JUMP {local}_render
LABEL {local}_float
LT LF@neg LF@value float@0x0p+0
MOVE LF@tmp LF@value
JUMPIFEQ {local}_float_abs LF@neg bool@false
SUB LF@tmp float@0x0p+0 LF@value
LABEL {local}_float_abs
MUL LF@tmp LF@tmp float@0x1.e848p+19
ADD LF@tmp LF@tmp float@0x1p-1
FLOAT2INT LF@tmp LF@tmp
IDIV LF@digits LF@tmp int@1000000
MUL LF@frac LF@digits int@1000000
SUB LF@frac LF@tmp LF@frac
JUMPIFNEQ {local}_trim LF@tmp int@0
MOVE LF@neg bool@false
LABEL {local}_trim
MOVE LF@count int@6
LABEL {local}_trim_loop
JUMPIFEQ {local}_render LF@frac int@0
IDIV LF@tmp LF@frac int@10
MUL LF@digit LF@tmp int@10
JUMPIFNEQ {local}_render LF@digit LF@frac
MOVE LF@frac LF@tmp
SUB LF@count LF@count int@1
JUMP {local}_trim_loop
LABEL {local}_render
JUMPIFEQ {local}_whole LF@frac int@0
LABEL {local}_frac_loop
JUMPIFEQ {local}_frac_done LF@count int@0
IDIV LF@tmp LF@frac int@10
MUL LF@digit LF@tmp int@10
SUB LF@digit LF@frac LF@digit
ADD LF@digit LF@digit int@48
INT2CHAR LF@char LF@digit
CONCAT LF@fracstr LF@char LF@fracstr
MOVE LF@frac LF@tmp
SUB LF@count LF@count int@1
JUMP {local}_frac_loop
LABEL {local}_frac_done
CONCAT LF@fracstr string@. LF@fracstr
LABEL {local}_whole
IDIV LF@tmp LF@digits int@10
MUL LF@digit LF@tmp int@10
SUB LF@digit LF@digits LF@digit
ADD LF@digit LF@digit int@48
INT2CHAR LF@char LF@digit
CONCAT LF@%retval LF@char LF@%retval
MOVE LF@digits LF@tmp
JUMPIFNEQ {local}_whole LF@digits int@0
CONCAT LF@%retval LF@%retval LF@fracstr
JUMPIFEQ {local}_end LF@neg bool@false
CONCAT LF@%retval string@- LF@%retval
LABEL {local}_end
POPFRAME
RETURN
"
    )
}

/// PHP truthiness: null, 0, 0.0, "" and "0" are false.
const TO_BOOL: &str = "LABEL %tobool
PUSHFRAME
DEFVAR LF@%retval
DEFVAR LF@value
DEFVAR LF@type
POPS LF@value
TYPE LF@type LF@value
MOVE LF@%retval bool@false
JUMPIFEQ %tobool_end LF@type string@nil
JUMPIFEQ %tobool_int LF@type string@int
JUMPIFEQ %tobool_float LF@type string@float
JUMPIFEQ %tobool_string LF@type string@string
MOVE LF@%retval LF@value
JUMP %tobool_end
LABEL %tobool_int
JUMPIFEQ %tobool_end LF@value int@0
MOVE LF@%retval bool@true
JUMP %tobool_end
LABEL %tobool_float
JUMPIFEQ %tobool_end LF@value float@0x0p+0
MOVE LF@%retval bool@true
JUMP %tobool_end
LABEL %tobool_string
JUMPIFEQ %tobool_end LF@value string@
JUMPIFEQ %tobool_end LF@value string@0
MOVE LF@%retval bool@true
LABEL %tobool_end
POPFRAME
RETURN
";

/// Null reads as int 0; ints and floats pass through unchanged.
const TO_NUMBER: &str = "LABEL %tonumber
PUSHFRAME
DEFVAR LF@%retval
DEFVAR LF@value
DEFVAR LF@type
POPS LF@value
TYPE LF@type LF@value
MOVE LF@%retval int@0
JUMPIFEQ %tonumber_end LF@type string@nil
MOVE LF@%retval LF@value
JUMPIFEQ %tonumber_end LF@type string@int
JUMPIFNEQ %type_error LF@type string@float
LABEL %tonumber_end
POPFRAME
RETURN
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_body_starts_with_its_label() {
        let all = [
            Routine::Readi,
            Routine::Write,
            Routine::Substring,
            Routine::Strval,
            Routine::ToInt,
            Routine::ToFloat,
            Routine::ToBool,
            Routine::TypeError,
        ];
        for routine in all {
            let body = routine.body();
            assert_eq!(
                body.lines().next(),
                Some(format!("LABEL {}", routine.label()).as_str())
            );
        }
    }

    #[test]
    fn internal_labels_stay_out_of_the_user_namespace() {
        let all = [
            Routine::Write,
            Routine::Ord,
            Routine::Chr,
            Routine::Substring,
            Routine::Intval,
            Routine::Floatval,
            Routine::Strval,
            Routine::ToInt,
            Routine::ToNumber,
            Routine::ToBool,
        ];
        for routine in all {
            for line in routine.body().lines().skip(1) {
                let words: Vec<&str> = line.split_whitespace().collect();
                let target = match words.as_slice() {
                    ["LABEL", label] | ["JUMP", label] => *label,
                    [op, label, ..] if op.starts_with("JUMPIF") => *label,
                    _ => continue,
                };
                assert!(target.starts_with('%'), "{} in {:?}", target, routine);
            }
        }
        assert!(Routine::Intval.body().contains("LABEL %intval_end\n"));
    }

    #[test]
    fn guards_exit_with_the_type_error_code() {
        assert!(Routine::TypeError.body().contains("EXIT int@7"));
        assert_eq!(Routine::Chr.dependencies(), &[Routine::TypeError]);
    }
}
