//! Per-class, per-method call report of a whole dex file.
//!
//! Classes come in class definitions order and, within a class, direct
//! methods precede virtual ones in declaration order. A method whose body
//! cannot be decoded, or a class whose data cannot be decoded, is kept in
//! the report with a failure marker so that nothing is silently dropped.

use crate::calls::{extract_calls, CallEdge};
use crate::errors::AnalysisResult;
use dc_dex::classes::ClassDefItem;
use dc_dex::errors::DexResult;
use dc_dex::methods::{EncodedMethod, MethodIdItem};
use dc_dex::{Dex, Index};
use rayon::prelude::*;
use serde::Serialize;

/// Options controlling how a [`Report`] is built.
#[derive(Debug, Default, Clone, Copy)]
pub struct Options {
    parallel: bool,
    jobs: Option<usize>,
}

impl Options {
    /// Classes are processed in turn on the calling thread.
    #[must_use]
    pub const fn sequential() -> Self {
        Self {
            parallel: false,
            jobs: None,
        }
    }

    /// Classes are processed on the global `rayon` pool.
    #[must_use]
    pub const fn parallel(self) -> Self {
        Self {
            parallel: true,
            ..self
        }
    }

    /// Classes are processed on a dedicated pool of `jobs` threads.
    #[must_use]
    pub const fn jobs(self, jobs: usize) -> Self {
        Self {
            parallel: true,
            jobs: Some(jobs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Calls(Vec<CallEdge>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodCalls {
    pub method: Index<MethodIdItem>,
    /// Declaring type and method name, e.g. `Lokio/Buffer;.read`.
    pub name: String,
    /// Byte size of the whole code item, 0 for methods without code.
    pub code_size: usize,
    pub outcome: Outcome,
}

impl MethodCalls {
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }

    /// Returns the call edges, empty for a failed method.
    #[must_use]
    pub fn calls(&self) -> &[CallEdge] {
        match &self.outcome {
            Outcome::Calls(calls) => calls,
            Outcome::Failed(_) => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassOutcome {
    Methods(Vec<MethodCalls>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassCalls {
    /// Class type descriptor.
    pub class: String,
    pub outcome: ClassOutcome,
}

impl ClassCalls {
    pub fn iter_methods(&self) -> impl Iterator<Item = &MethodCalls> {
        let methods: &[MethodCalls] = match &self.outcome {
            ClassOutcome::Methods(methods) => methods,
            ClassOutcome::Failed(_) => &[],
        };
        methods.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Signatures of the method table, e.g. `Lokio/Buffer;.read(Lokio/Buffer;J)`,
    /// by method index.
    pub methods: Vec<String>,
    /// One entry per class definition holding class data.
    pub classes: Vec<ClassCalls>,
}

impl Report {
    /// Signature of a method table entry.
    #[must_use]
    pub fn signature(&self, idx: Index<MethodIdItem>) -> Option<&str> {
        self.methods.get(idx.as_usize()).map(String::as_str)
    }

    pub fn iter_methods(&self) -> impl Iterator<Item = &MethodCalls> {
        self.classes.iter().flat_map(ClassCalls::iter_methods)
    }

    #[must_use]
    pub fn nb_failed_classes(&self) -> usize {
        self.classes
            .iter()
            .filter(|class| matches!(class.outcome, ClassOutcome::Failed(_)))
            .count()
    }

    #[must_use]
    pub fn nb_failed_methods(&self) -> usize {
        self.iter_methods().filter(|m| m.is_failed()).count()
    }
}

/// Builds the call report of the given dex.
pub fn build(dex: &Dex, options: &Options) -> AnalysisResult<Report> {
    let methods = dex
        .iter_method_ids()
        .map(|method| method.signature(dex))
        .collect::<DexResult<Vec<String>>>()?;

    let class_defs: Vec<&ClassDefItem> = dex.iter_class_defs().filter(|c| c.has_data()).collect();
    log::debug!(
        "{} methods, {} classes with data out of {}",
        methods.len(),
        class_defs.len(),
        dex.class_defs().len()
    );

    let classes = match options.jobs {
        Some(jobs) => {
            log::debug!("analyzing classes on a pool of {jobs} threads");
            let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
            pool.install(|| analyze_classes_par(dex, &class_defs))?
        }
        None if options.parallel => analyze_classes_par(dex, &class_defs)?,
        None => class_defs
            .iter()
            .map(|class_def| analyze_class(dex, class_def))
            .collect::<DexResult<Vec<ClassCalls>>>()?,
    };

    Ok(Report { methods, classes })
}

fn analyze_classes_par(dex: &Dex, class_defs: &[&ClassDefItem]) -> DexResult<Vec<ClassCalls>> {
    class_defs
        .par_iter()
        .map(|class_def| analyze_class(dex, class_def))
        .collect()
}

fn analyze_class(dex: &Dex, class_def: &ClassDefItem) -> DexResult<ClassCalls> {
    let class = class_def.descriptor(dex)?.to_string();
    let outcome = match dex.read_class_data(class_def) {
        Ok(data) => ClassOutcome::Methods(
            data.iter_methods()
                .map(|method| analyze_method(dex, method))
                .collect(),
        ),
        Err(err) => {
            log::warn!("{class}: cannot decode class data: {err}");
            ClassOutcome::Failed(err.to_string())
        }
    };
    Ok(ClassCalls { class, outcome })
}

fn analyze_method(dex: &Dex, method: &EncodedMethod) -> MethodCalls {
    let index = method.index();
    let name = method
        .descriptor(dex)
        .and_then(|descr| descr.qualified_name(dex))
        .unwrap_or_else(|_| format!("method@{index}"));

    let (code_size, result) = match dex.read_code(method) {
        Ok(None) => (0, Ok(Vec::new())),
        Ok(Some(code)) => (
            code.byte_size(),
            extract_calls(index, code.instructions(), dex),
        ),
        Err(err) => (0, Err(err)),
    };

    let outcome = match result {
        Ok(calls) => {
            log::debug!("{name}: {} call(s)", calls.len());
            Outcome::Calls(calls)
        }
        Err(err) => {
            log::warn!("{name}: {err}");
            Outcome::Failed(err.to_string())
        }
    };

    MethodCalls {
        method: index,
        name,
        code_size,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dc_testdex::{asm, ClassDef, Code, DexBuilder, MethodDef};

    // Two classes, the first one calling m1, m2, m1 from `LA;.main`, the
    // second one holding an undecodable `LC;.broken` and a sane `LC;.ok`.
    fn sample(corrupt: bool) -> Dex {
        let mut b = DexBuilder::new();
        let init = b.method("LA;", "<init>", "V", &[]);
        let main = b.method("LA;", "main", "V", &["[Ljava/lang/String;"]);
        let m1 = b.method("LB;", "m1", "V", &[]);
        let m2 = b.method("LB;", "m2", "I", &["J"]);
        let broken = b.method("LC;", "broken", "V", &[]);
        let ok = b.method("LC;", "ok", "V", &[]);
        let run = b.method("LC;", "run", "V", &[]);

        let main_insns = [
            asm::invoke(asm::INVOKE_STATIC, m1, &[]),
            asm::invoke(asm::INVOKE_VIRTUAL, m2, &[0, 1, 2]),
            asm::invoke(asm::INVOKE_STATIC, m1, &[]),
            asm::return_void(),
        ]
        .concat();
        let broken_insns = if corrupt {
            vec![0x0073, 0x000e]
        } else {
            asm::return_void()
        };

        b.class(
            ClassDef::new("LA;")
                .direct_method(
                    MethodDef::new(init, 0x10001).code(Code::new(1, 1, 0, asm::return_void())),
                )
                .direct_method(MethodDef::new(main, 0x9).code(Code::new(3, 1, 3, main_insns))),
        );
        b.class(
            ClassDef::new("LC;")
                .direct_method(MethodDef::new(broken, 0x9).code(Code::new(1, 0, 0, broken_insns)))
                .direct_method(
                    MethodDef::new(ok, 0x9)
                        .code(Code::new(1, 0, 0, [asm::invoke(asm::INVOKE_STATIC, m1, &[]), asm::return_void()].concat())),
                )
                .virtual_method(MethodDef::new(run, 0x401)),
        );
        dc_dex::parse(&b.build().unwrap()).unwrap()
    }

    fn names(calls: &[CallEdge], report: &Report) -> Vec<String> {
        calls
            .iter()
            .map(|e| report.signature(e.target()).unwrap().to_string())
            .collect()
    }

    #[test]
    fn method_table() {
        let dex = sample(false);
        let report = build(&dex, &Options::sequential()).unwrap();
        assert_eq!(report.methods.len(), 7);
        assert_eq!(report.methods[1], "LA;.main([Ljava/lang/String;)");
        assert_eq!(report.methods[3], "LB;.m2(J)");
    }

    #[test]
    fn calls_in_declaration_order() {
        let dex = sample(false);
        let report = build(&dex, &Options::sequential()).unwrap();
        assert_eq!(report.classes.len(), 2);
        assert_eq!(report.classes[0].class, "LA;");

        let methods: Vec<&MethodCalls> = report.classes[0].iter_methods().collect();
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].name, "LA;.<init>");
        assert!(methods[0].calls().is_empty());
        assert_eq!(methods[1].name, "LA;.main");
        // 16 bytes header, 10 code units
        assert_eq!(methods[1].code_size, 16 + 20);
        assert_eq!(
            names(methods[1].calls(), &report),
            vec!["LB;.m1()", "LB;.m2(J)", "LB;.m1()"]
        );
    }

    #[test]
    fn failures_are_contained() {
        let dex = sample(true);
        let report = build(&dex, &Options::sequential()).unwrap();

        let first: Vec<&MethodCalls> = report.classes[0].iter_methods().collect();
        assert!(first.iter().all(|m| !m.is_failed()));
        assert_eq!(first[1].calls().len(), 3);

        let second: Vec<&MethodCalls> = report.classes[1].iter_methods().collect();
        assert_eq!(second.len(), 3);
        assert_eq!(second[0].name, "LC;.broken");
        assert!(matches!(&second[0].outcome, Outcome::Failed(msg) if msg.contains("unknown opcode")));
        assert_eq!(second[0].code_size, 16 + 4);
        assert_eq!(names(second[1].calls(), &report), vec!["LB;.m1()"]);
        assert_eq!(report.nb_failed_methods(), 1);
    }

    #[test]
    fn method_without_code() {
        let dex = sample(false);
        let report = build(&dex, &Options::sequential()).unwrap();
        let run = report.classes[1].iter_methods().last().unwrap();
        assert_eq!(run.name, "LC;.run");
        assert_eq!(run.code_size, 0);
        assert_eq!(run.outcome, Outcome::Calls(Vec::new()));
    }

    #[test]
    fn class_failure_marker() {
        let mut b = DexBuilder::new();
        // one direct method whose index lies past the method table
        b.class(ClassDef::new("LA;").raw_data(vec![0, 0, 1, 0, 5, 1, 0]));
        b.class(ClassDef::new("LB;").without_data());
        let dex = dc_dex::parse(&b.build().unwrap()).unwrap();

        let report = build(&dex, &Options::sequential()).unwrap();
        assert_eq!(report.classes.len(), 1);
        assert!(matches!(report.classes[0].outcome, ClassOutcome::Failed(_)));
        assert_eq!(report.classes[0].iter_methods().count(), 0);
        assert_eq!(report.nb_failed_classes(), 1);
    }

    #[test]
    fn parallel_matches_sequential() {
        let dex = sample(true);
        let sequential = build(&dex, &Options::sequential()).unwrap();
        let parallel = build(&dex, &Options::default().parallel()).unwrap();
        let pooled = build(&dex, &Options::default().jobs(2)).unwrap();
        assert_eq!(sequential, parallel);
        assert_eq!(sequential, pooled);
    }

    #[test]
    fn sizes() {
        let dex = sample(false);
        let report = build(&dex, &Options::sequential()).unwrap();
        let sizes: Vec<usize> = report.classes[1]
            .iter_methods()
            .map(|m| m.code_size)
            .collect();
        assert_eq!(sizes, vec![18, 24, 0]);
    }
}
