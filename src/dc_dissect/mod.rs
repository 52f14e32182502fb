use crate::prelude::*;
use clap::ArgMatches;
use dc_dex::PrettyPrinter;
use std::io::{self, BufWriter, Write};

pub fn run(args: &ArgMatches) -> DcResult<()> {
    init_logger(args);

    let input_fname = args
        .get_one::<String>("input")
        .ok_or_else(|| DcError::BadArguments("--input needed".to_string()))?;
    let dex = dc_dex::open(input_fname)?;

    let table = args
        .get_one::<String>("table")
        .ok_or_else(|| DcError::BadArguments("--table needed".to_string()))?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    dump_table(&mut out, &dex, table)?;
    out.flush()?;
    Ok(())
}

pub fn dump_table<W: Write>(out: &mut W, dex: &Dex, table: &str) -> DcResult<()> {
    match table {
        "header" => {
            writeln!(out, "version   = {:03}", dex.version())?;
            writeln!(out, "checksum  = {:#010x}", dex.checksum())?;
            write!(out, "signature = ")?;
            for byte in dex.signature() {
                write!(out, "{byte:02x}")?;
            }
            writeln!(out)?;
            writeln!(out, "file size = {}", dex.file_size())?;
        }
        "map" => {
            for item in dex.map_items() {
                writeln!(
                    out,
                    "{:<28} offset={:#010x} size={}",
                    item.typ().to_string(),
                    item.offset(),
                    item.size()
                )?;
            }
        }
        "strings" => {
            for (i, string) in dex.iter_string_ids().enumerate() {
                writeln!(out, "String[{:6}] = {}", i, PrettyPrinter(string, dex))?;
            }
        }
        "types" => {
            for (i, type_) in dex.iter_type_ids().enumerate() {
                writeln!(out, "Type[{:6}] = {}", i, PrettyPrinter(type_, dex))?;
            }
        }
        "protos" => {
            for (i, proto) in dex.iter_proto_ids().enumerate() {
                writeln!(out, "Proto[{:6}] = {}", i, PrettyPrinter(proto, dex))?;
            }
        }
        "fields" => {
            for (i, field) in dex.iter_field_ids().enumerate() {
                writeln!(out, "Field[{:6}] = {}", i, PrettyPrinter(field, dex))?;
            }
        }
        "methods" => {
            for (i, method) in dex.iter_method_ids().enumerate() {
                writeln!(out, "Method[{:6}] = {}", i, PrettyPrinter(method, dex))?;
            }
        }
        "classes" => {
            for (i, class) in dex.iter_class_defs().enumerate() {
                write!(out, "Class[{:6}] = {}{}", i, class.flags(), class.descriptor(dex)?)?;
                if let Some(superclass) = class.superclass(dex)? {
                    write!(out, " extends {superclass}")?;
                }
                let interfaces = class.interfaces(dex)?;
                if !interfaces.is_empty() {
                    write!(out, " implements {}", interfaces.join(", "))?;
                }
                if let Some(source_file) = class.source_file(dex)? {
                    write!(out, " ({source_file})")?;
                }
                writeln!(out)?;
            }
        }
        _ => {
            return Err(DcError::BadArguments(format!(
                "subcommand 'dissect' does not know table '{table}'"
            )))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dc_testdex::{ClassDef, DexBuilder};

    fn dump(table: &str) -> DcResult<String> {
        let mut b = DexBuilder::new();
        b.method("LA;", "run", "V", &["I"]);
        b.class(
            ClassDef::new("LA;")
                .flags(0x11)
                .superclass("Ljava/lang/Object;")
                .interface("Ljava/lang/Runnable;")
                .source_file("A.java")
                .without_data(),
        );
        let dex = dc_dex::parse(&b.build().unwrap()).unwrap();
        let mut out = Vec::new();
        dump_table(&mut out, &dex, table)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn header() {
        let output = dump("header").unwrap();
        assert!(output.starts_with("version   = 035\n"));
        assert!(output.contains("signature = "));
    }

    #[test]
    fn classes() {
        let output = dump("classes").unwrap();
        assert_eq!(
            output,
            "Class[     0] = public final LA; extends Ljava/lang/Object; implements Ljava/lang/Runnable; (A.java)\n"
        );
    }

    #[test]
    fn map_and_tables() {
        assert!(dump("map").unwrap().starts_with("HEADER_ITEM"));
        assert!(dump("methods").unwrap().starts_with("Method[     0] = "));
        assert!(matches!(dump("resources"), Err(DcError::BadArguments(_))));
    }
}
