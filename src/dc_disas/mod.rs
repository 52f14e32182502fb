use crate::prelude::*;
use clap::ArgMatches;
use dc_dex::PrettyPrinter;
use nu_ansi_term::Color;
use regex::Regex;
use std::io::{self, BufWriter, Write};

pub fn run(args: &ArgMatches) -> DcResult<()> {
    init_logger(args);

    let input_fname = args
        .get_one::<String>("input")
        .ok_or_else(|| DcError::BadArguments("--input needed".to_string()))?;
    let dex = dc_dex::open(input_fname)?;

    let class_pattern = args
        .get_one::<String>("filter-class")
        .map(|r| Regex::new(r))
        .transpose()?;
    let method_pattern = args
        .get_one::<String>("filter-method")
        .map(|r| Regex::new(r))
        .transpose()?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    disassemble(
        &mut out,
        &dex,
        class_pattern.as_ref(),
        method_pattern.as_ref(),
        true,
    )?;
    out.flush()?;
    Ok(())
}

/// Prints the bytecode of every method with code, failures being painted
/// in red when `colored` is set.
pub fn disassemble<W: Write>(
    out: &mut W,
    dex: &Dex,
    class_pattern: Option<&Regex>,
    method_pattern: Option<&Regex>,
    colored: bool,
) -> DcResult<()> {
    let failure = |msg: String| {
        if colored {
            Color::Red.paint(msg).to_string()
        } else {
            msg
        }
    };

    for class in dex.iter_class_defs().filter(|c| c.has_data()) {
        let class_name = class.descriptor(dex)?;
        if class_pattern.map_or(false, |re| !re.is_match(class_name)) {
            continue;
        }
        let data = match dex.read_class_data(class) {
            Ok(data) => data,
            Err(err) => {
                writeln!(out, "{}", failure(format!("[!] {class_name}: {err}")))?;
                continue;
            }
        };

        for method in data.iter_methods() {
            let descriptor = method.descriptor(dex)?;
            let name = descriptor.name(dex)?;
            if method_pattern.map_or(false, |re| !re.is_match(name)) {
                continue;
            }
            let code = match dex.read_code(method) {
                Ok(Some(code)) => code,
                Ok(None) => continue,
                Err(err) => {
                    writeln!(out, "{}", failure(format!("[!] {}: {err}", descriptor.signature(dex)?)))?;
                    continue;
                }
            };

            writeln!(out, "[*] {}", PrettyPrinter(descriptor, dex))?;
            for instr in code.instructions() {
                match instr {
                    Ok(instr) => writeln!(out, "    {:04}: {}", instr.addr(), PrettyPrinter(&instr, dex))?,
                    Err(err) => writeln!(out, "{}", failure(format!("    {err}")))?,
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dc_testdex::{asm, ClassDef, Code, DexBuilder, MethodDef};

    fn sample() -> Dex {
        let mut b = DexBuilder::new();
        let main = b.method("LA;", "main", "V", &[]);
        let bad = b.method("LA;", "bad", "V", &[]);
        let hello = b.string("hello");
        let insns = [asm::const_string(0, hello as u16), asm::invoke(asm::INVOKE_STATIC, bad, &[]), asm::return_void()].concat();
        b.class(
            ClassDef::new("LA;")
                .direct_method(MethodDef::new(main, 0x9).code(Code::new(1, 0, 0, insns)))
                .direct_method(MethodDef::new(bad, 0x9).code(Code::new(1, 0, 0, vec![0x0012, 0x000e, 0x0000, 0x003f]))),
        );
        b.class(ClassDef::new("LB;").raw_data(vec![0, 0, 1, 0, 9, 1, 0]));
        dc_dex::parse(&b.build().unwrap()).unwrap()
    }

    fn render(class: Option<&str>, method: Option<&str>, colored: bool) -> String {
        let dex = sample();
        let class = class.map(|r| Regex::new(r).unwrap());
        let method = method.map(|r| Regex::new(r).unwrap());
        let mut out = Vec::new();
        disassemble(&mut out, &dex, class.as_ref(), method.as_ref(), colored).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn listing() {
        let output = render(None, None, false);
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[0].starts_with("[*] "));
        assert!(lines[1].starts_with("    0000: const-string v0, \"hello\""));
        assert!(lines[2].starts_with("    0002: invoke-static"));
        assert!(lines[3].starts_with("    0005: return-void"));
        assert!(lines[4].starts_with("[*] "));
        assert_eq!(lines[5], "    0000: const/4 v0, #+0");
        assert_eq!(lines[6], "    0001: return-void");
        assert_eq!(lines[7], "    0002: nop");
        assert!(lines[8].starts_with("    unknown opcode 0x3f at address 3"));
        assert!(lines[9].starts_with("[!] LB;: "));
        assert_eq!(lines.len(), 10);
    }

    #[test]
    fn filters_and_colors() {
        let output = render(Some("^LA;$"), Some("^bad$"), true);
        assert!(!output.contains("const-string"));
        assert!(!output.contains("LB;"));
        assert!(output.contains("\u{1b}[31m    unknown opcode"));
    }
}
