//! Graph representation of the calls between the methods of a dex file.

use crate::errors::AnalysisResult;
use crate::report::{Outcome, Report};
use dc_dex::methods::MethodIdItem;
use dc_dex::{Addr, Index};
use petgraph::dot::{Config, Dot};
use petgraph::prelude::*;
use petgraph::visit::Reversed;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodStatus {
    /// Declared with a body (or none) that was successfully decoded.
    Declared,
    /// Declared, but its body could not be decoded.
    Failed,
    /// Only referenced from the method table.
    External,
}

#[derive(Debug, Clone)]
pub struct Method {
    index: Index<MethodIdItem>,
    signature: String,
    status: MethodStatus,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.signature.fmt(f)
    }
}

impl Method {
    #[inline]
    #[must_use]
    pub const fn index(&self) -> Index<MethodIdItem> {
        self.index
    }

    #[inline]
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    #[inline]
    #[must_use]
    pub const fn status(&self) -> MethodStatus {
        self.status
    }

    /// Declaring type descriptor.
    #[must_use]
    pub fn class_name(&self) -> &str {
        self.signature
            .split_once('.')
            .map_or(self.signature.as_str(), |(class, _)| class)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        let name = self
            .signature
            .split_once('.')
            .map_or("", |(_, rest)| rest);
        name.split_once('(').map_or(name, |(name, _)| name)
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    call_addrs: BTreeSet<Addr>,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, addr) in self.call_addrs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{addr}")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct CallGraph {
    inner: DiGraph<Method, Call>,
}

impl CallGraph {
    /// Builds a callgraph out of a call report. Every method declared with
    /// class data gets a node, and external methods are added the first
    /// time a declared method calls them. Calls of a method to the same
    /// target are merged into one edge holding all the call addresses.
    #[must_use]
    pub fn from_report(report: &Report) -> Self {
        let mut cg = DiGraph::new();
        let mut nodes_map: BTreeMap<Index<MethodIdItem>, NodeIndex> = BTreeMap::new();

        for method in report.iter_methods() {
            let status = if method.is_failed() {
                MethodStatus::Failed
            } else {
                MethodStatus::Declared
            };
            let node = cg.add_node(Method {
                index: method.method,
                signature: signature_of(report, method.method),
                status,
            });
            nodes_map.insert(method.method, node);
        }

        for method in report.iter_methods() {
            let Outcome::Calls(calls) = &method.outcome else {
                continue;
            };
            let src = nodes_map[&method.method];

            let mut targets: BTreeMap<Index<MethodIdItem>, BTreeSet<Addr>> = BTreeMap::new();
            for call in calls {
                targets.entry(call.target()).or_default().insert(call.addr());
            }

            for (target, call_addrs) in targets {
                let dst = *nodes_map.entry(target).or_insert_with(|| {
                    cg.add_node(Method {
                        index: target,
                        signature: signature_of(report, target),
                        status: MethodStatus::External,
                    })
                });
                cg.add_edge(src, dst, Call { call_addrs });
            }
        }

        Self { inner: cg }
    }

    #[must_use]
    pub fn to_dot(&self) -> String {
        let dot = Dot::with_attr_getters(
            &self.inner,
            &[Config::GraphContentOnly],
            &|_, _| String::new(),
            &|_, (_, method)| {
                let color = match method.status {
                    MethodStatus::Declared => "black",
                    MethodStatus::External => "blue",
                    MethodStatus::Failed => "red",
                };
                format!("color={color},shape=box")
            },
        );
        format!("digraph {{\n  rankdir=LR;\n{dot}}}")
    }

    /// Keeps the methods matching the predicate along with every method
    /// from which they can be reached.
    #[must_use]
    pub fn filter<P>(&self, predicate: P) -> Self
    where
        P: Fn(&Method) -> bool,
    {
        // node ids must survive removals
        let mut stable_graph: StableDiGraph<_, _> = self.inner.clone().into();

        let mut to_remove: BTreeSet<NodeIndex> = stable_graph.node_indices().collect();

        let reversed = Reversed(&stable_graph);
        let mut dfs = Dfs::empty(reversed);
        for id in stable_graph.node_indices() {
            if predicate(&stable_graph[id]) {
                dfs.move_to(id);
                while let Some(keep_id) = dfs.next(reversed) {
                    to_remove.remove(&keep_id);
                }
            }
        }

        stable_graph.retain_nodes(|_, id| !to_remove.contains(&id));

        Self {
            inner: stable_graph.into(),
        }
    }

    /// Same as [`CallGraph::filter`], with optional regexes over class
    /// descriptors and method names.
    pub fn filter_matching(
        &self,
        class_pattern: Option<&str>,
        method_pattern: Option<&str>,
    ) -> AnalysisResult<Self> {
        let class_re = class_pattern.map(Regex::new).transpose()?;
        let method_re = method_pattern.map(Regex::new).transpose()?;
        log::debug!(
            "filtering callgraph on class pattern {:?}, method pattern {:?}",
            class_re,
            method_re
        );
        Ok(self.filter(|meth| {
            class_re.as_ref().map_or(true, |re| re.is_match(meth.class_name()))
                && method_re.as_ref().map_or(true, |re| re.is_match(meth.name()))
        }))
    }

    pub fn iter_methods(&self) -> impl Iterator<Item = &Method> {
        self.inner.node_weights()
    }

    /// Returns the methods directly called by the given one.
    pub fn callees(&self, index: Index<MethodIdItem>) -> Vec<&Method> {
        self.inner
            .node_indices()
            .find(|id| self.inner[*id].index == index)
            .map(|id| {
                self.inner
                    .neighbors_directed(id, Direction::Outgoing)
                    .map(|n| &self.inner[n])
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn nb_methods(&self) -> usize {
        self.inner.node_count()
    }

    #[must_use]
    pub fn nb_calls(&self) -> usize {
        self.inner.edge_count()
    }

    #[must_use]
    pub fn nb_external_methods(&self) -> usize {
        self.inner
            .node_weights()
            .filter(|m| m.status == MethodStatus::External)
            .count()
    }

    #[must_use]
    pub fn nb_failed_methods(&self) -> usize {
        self.inner
            .node_weights()
            .filter(|m| m.status == MethodStatus::Failed)
            .count()
    }
}

fn signature_of(report: &Report, index: Index<MethodIdItem>) -> String {
    report
        .signature(index)
        .map_or_else(|| format!("method@{index}"), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{build, Options};
    use dc_testdex::{asm, ClassDef, Code, DexBuilder, MethodDef};

    fn graph() -> CallGraph {
        let mut b = DexBuilder::new();
        let main = b.method("LA;", "main", "V", &[]);
        let helper = b.method("LA;", "helper", "V", &["I"]);
        let broken = b.method("LA;", "broken", "V", &[]);
        let println = b.method("Ljava/io/PrintStream;", "println", "V", &["Ljava/lang/String;"]);
        let unused = b.method("LZ;", "unused", "V", &[]);

        let main_insns = [
            asm::invoke(asm::INVOKE_STATIC, helper, &[0]),
            asm::invoke(asm::INVOKE_VIRTUAL, println, &[0, 1]),
            asm::invoke(asm::INVOKE_STATIC, helper, &[1]),
            asm::return_void(),
        ]
        .concat();
        let helper_insns = [
            asm::invoke(asm::INVOKE_VIRTUAL, println, &[0, 0]),
            asm::return_void(),
        ]
        .concat();

        b.class(
            ClassDef::new("LA;")
                .direct_method(MethodDef::new(main, 0x9).code(Code::new(2, 0, 2, main_insns)))
                .direct_method(MethodDef::new(helper, 0x9).code(Code::new(1, 1, 2, helper_insns)))
                .direct_method(
                    MethodDef::new(broken, 0x9).code(Code::new(1, 0, 0, vec![0x0079])),
                ),
        );
        b.class(
            ClassDef::new("LZ;")
                .direct_method(MethodDef::new(unused, 0x9).code(Code::new(0, 0, 0, asm::return_void()))),
        );
        let dex = dc_dex::parse(&b.build().unwrap()).unwrap();
        let report = build(&dex, &Options::sequential()).unwrap();
        CallGraph::from_report(&report)
    }

    #[test]
    fn nodes_and_edges() {
        let cg = graph();
        assert_eq!(cg.nb_methods(), 5);
        assert_eq!(cg.nb_external_methods(), 1);
        assert_eq!(cg.nb_failed_methods(), 1);
        // main -> helper (merged), main -> println, helper -> println
        assert_eq!(cg.nb_calls(), 3);

        let main = cg
            .iter_methods()
            .find(|m| m.signature() == "LA;.main()")
            .unwrap();
        let callees: Vec<&str> = cg.callees(main.index()).iter().map(|m| m.signature()).collect();
        assert_eq!(callees.len(), 2);
        assert!(callees.contains(&"LA;.helper(I)"));
        assert!(callees.contains(&"Ljava/io/PrintStream;.println(Ljava/lang/String;)"));
    }

    #[test]
    fn method_names() {
        let cg = graph();
        let println = cg
            .iter_methods()
            .find(|m| m.status() == MethodStatus::External)
            .unwrap();
        assert_eq!(println.class_name(), "Ljava/io/PrintStream;");
        assert_eq!(println.name(), "println");
    }

    #[test]
    fn dot_rendering() {
        let dot = graph().to_dot();
        assert!(dot.starts_with("digraph {\n  rankdir=LR;\n"));
        assert!(dot.ends_with('}'));
        assert!(dot.contains("LA;.main()"));
        assert!(dot.contains("color=blue,shape=box"));
        assert!(dot.contains("color=red,shape=box"));
        assert!(dot.contains("label = \"0, 6\""));
    }

    #[test]
    fn filtering() {
        let cg = graph();
        let filtered = cg.filter_matching(None, Some("^helper$")).unwrap();
        // helper and its only caller
        assert_eq!(filtered.nb_methods(), 2);
        assert_eq!(filtered.nb_calls(), 1);

        let filtered = cg.filter_matching(Some("PrintStream"), None).unwrap();
        assert_eq!(filtered.nb_methods(), 3);

        assert!(cg.filter_matching(Some("("), None).is_err());
    }
}
