//! Backward liveness over one method's instruction graph.
//!
//! `def`/`use` are computed once per instruction, then `in`/`out` are refined
//! by passes in reverse instruction order until nothing changes. The result
//! never refers back to the IR, so it can outlive the method it describes.

use jmm_syntax::ir::{Instruction, IrMethod};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::Write as _;

pub type VarSet = BTreeSet<String>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Liveness {
    pub def: BTreeMap<u32, VarSet>,
    pub uses: BTreeMap<u32, VarSet>,
    pub live_in: BTreeMap<u32, VarSet>,
    pub live_out: BTreeMap<u32, VarSet>,
    /// Every variable the method defines, including definitions nobody reads.
    pub exit: VarSet,
    /// Full passes run, the last one being the pass that changed nothing.
    pub passes: usize,
}

fn def_set(instr: &Instruction) -> VarSet {
    instr.kind.defined_var().map(str::to_string).into_iter().collect()
}

fn use_set(instr: &Instruction) -> VarSet {
    instr.kind.read_vars().into_iter().collect()
}

pub fn analyze(method: &IrMethod) -> Liveness {
    let mut lv = Liveness::default();
    for instr in &method.instructions {
        lv.def.insert(instr.id, def_set(instr));
        lv.uses.insert(instr.id, use_set(instr));
        lv.live_in.insert(instr.id, VarSet::new());
        lv.live_out.insert(instr.id, VarSet::new());
    }

    let mut changed = true;
    while changed {
        changed = false;
        lv.passes += 1;
        for instr in method.instructions.iter().rev() {
            let mut out = VarSet::new();
            for s in &instr.successors {
                if let Some(s_in) = lv.live_in.get(s) {
                    out.extend(s_in.iter().cloned());
                }
            }
            let mut inn = lv.uses[&instr.id].clone();
            inn.extend(out.difference(&lv.def[&instr.id]).cloned());

            if lv.live_out[&instr.id] != out {
                lv.live_out.insert(instr.id, out);
                changed = true;
            }
            if lv.live_in[&instr.id] != inn {
                lv.live_in.insert(instr.id, inn);
                changed = true;
            }
        }
    }

    for d in lv.def.values() {
        lv.exit.extend(d.iter().cloned());
    }

    log::debug!(
        "liveness {}: {} instructions, {} passes",
        method.name,
        method.instructions.len(),
        lv.passes
    );
    lv
}

impl Liveness {
    /// Check the dataflow equations against `method`'s graph.
    pub fn is_fixpoint(&self, method: &IrMethod) -> bool {
        let ids: HashSet<u32> = method.instructions.iter().map(|i| i.id).collect();
        method.instructions.iter().all(|instr| {
            let mut out = VarSet::new();
            for s in instr.successors.iter().filter(|s| ids.contains(*s)) {
                out.extend(self.live_in[s].iter().cloned());
            }
            let mut inn = self.uses[&instr.id].clone();
            inn.extend(out.difference(&self.def[&instr.id]).cloned());
            self.live_out[&instr.id] == out && self.live_in[&instr.id] == inn
        })
    }

    /// One line per instruction: id, text, and the four sets.
    pub fn render(&self, method: &IrMethod) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "{} ({} passes)", method.name, self.passes);
        for instr in &method.instructions {
            let _ = writeln!(
                s,
                "  {:>3}: {:<40} def{} use{} in{} out{}",
                instr.id,
                instr.kind.to_string(),
                braces(&self.def[&instr.id]),
                braces(&self.uses[&instr.id]),
                braces(&self.live_in[&instr.id]),
                braces(&self.live_out[&instr.id]),
            );
        }
        let _ = writeln!(s, "  exit{}", braces(&self.exit));
        s
    }
}

fn braces(set: &VarSet) -> String {
    let items: Vec<&str> = set.iter().map(String::as_str).collect();
    format!("{{{}}}", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jmm_syntax::ast::{AccessModifier, BinOp};
    use jmm_syntax::ir::{Code, InstrKind, IrMethodHeader, IrParam, IrType, Operand};

    fn header() -> IrMethodHeader {
        IrMethodHeader {
            name: "f".into(),
            access: AccessModifier::Public,
            is_static: false,
            is_constructor: false,
            params: vec![IrParam {
                name: "n".into(),
                ty: IrType::Int32,
            }],
            return_type: IrType::Int32,
        }
    }

    fn var(n: &str) -> Operand {
        Operand::var(n, IrType::Int32)
    }

    fn n() -> Operand {
        Operand::Param {
            index: 1,
            name: "n".into(),
            ty: IrType::Int32,
        }
    }

    fn set(items: &[&str]) -> VarSet {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn assign(dest: &str, rhs: InstrKind) -> Code {
        Code::Instr(InstrKind::Assign {
            dest: var(dest),
            ty: IrType::Int32,
            rhs: Box::new(rhs),
        })
    }

    fn add(l: Operand, r: Operand) -> InstrKind {
        InstrKind::BinaryOp {
            op: BinOp::Add,
            lhs: l,
            rhs: r,
        }
    }

    /// ```text
    /// 1: i := 0
    /// 2: s := 0
    /// 3: if (i < n) goto body     whilecond
    /// 4: goto end
    /// 5: s := s + i               body
    /// 6: i := i + 1
    /// 7: goto cond
    /// 8: ret s                    end
    /// ```
    fn counting_loop() -> IrMethod {
        let code = vec![
            assign("i", InstrKind::SingleOp(Operand::int(0))),
            assign("s", InstrKind::SingleOp(Operand::int(0))),
            Code::Label("cond".into()),
            Code::Instr(InstrKind::Branch {
                cond: Box::new(InstrKind::BinaryOp {
                    op: BinOp::Lt,
                    lhs: var("i"),
                    rhs: n(),
                }),
                label: "body".into(),
            }),
            Code::Instr(InstrKind::Goto {
                label: "end".into(),
            }),
            Code::Label("body".into()),
            assign("s", add(var("s"), var("i"))),
            assign("i", add(var("i"), Operand::int(1))),
            Code::Instr(InstrKind::Goto {
                label: "cond".into(),
            }),
            Code::Label("end".into()),
            Code::Instr(InstrKind::Return {
                value: Some(var("s")),
            }),
        ];
        IrMethod::assemble(header(), code).unwrap()
    }

    #[test]
    fn loop_keeps_counter_and_sum_live_around_back_edge() {
        let m = counting_loop();
        let lv = analyze(&m);
        assert!(lv.is_fixpoint(&m));
        assert_eq!(lv.live_in[&3], set(&["i", "n", "s"]));
        assert_eq!(lv.live_out[&7], set(&["i", "n", "s"]));
        assert_eq!(lv.live_out[&4], set(&["s"]));
        assert_eq!(lv.live_in[&8], set(&["s"]));
        assert!(lv.live_out[&8].is_empty());
        assert_eq!(lv.live_in[&1], set(&["n"]));
    }

    #[test]
    fn passes_bounded_by_instruction_count() {
        let m = counting_loop();
        let lv = analyze(&m);
        assert!(lv.passes >= 2);
        assert!(lv.passes <= m.instructions.len() + 1);
    }

    #[test]
    fn dead_definition_shows_up_only_in_exit() {
        let code = vec![
            assign("a", InstrKind::SingleOp(Operand::int(1))),
            assign("b", InstrKind::SingleOp(Operand::int(2))),
            Code::Instr(InstrKind::Return {
                value: Some(var("a")),
            }),
        ];
        let m = IrMethod::assemble(header(), code).unwrap();
        let lv = analyze(&m);
        assert!(!lv.live_out[&2].contains("b"));
        assert!(lv.live_out.values().all(|s| !s.contains("b")));
        assert_eq!(lv.exit, set(&["a", "b"]));
        assert!(lv.is_fixpoint(&m));
    }

    #[test]
    fn array_store_defines_nothing_and_reads_array_and_index() {
        let arr = Operand::var("a", IrType::int_array());
        let code = vec![
            Code::Instr(InstrKind::Assign {
                dest: Operand::ArrayElem {
                    array: Box::new(arr),
                    index: Box::new(var("k")),
                    ty: IrType::Int32,
                },
                ty: IrType::Int32,
                rhs: Box::new(InstrKind::SingleOp(var("v"))),
            }),
            Code::Instr(InstrKind::Return { value: None }),
        ];
        let m = IrMethod::assemble(header(), code).unwrap();
        let lv = analyze(&m);
        assert!(lv.def[&1].is_empty());
        assert_eq!(lv.uses[&1], set(&["a", "k", "v"]));
    }

    #[test]
    fn call_reads_target_and_arguments() {
        let obj = Operand::var("o", IrType::Object("B".into()));
        let code = vec![Code::Instr(InstrKind::Call {
            invocation: jmm_syntax::ir::Invocation::Virtual,
            target: obj,
            method: Some("m".into()),
            args: vec![var("x"), Operand::int(3)],
            ret: IrType::Void,
        })];
        let m = IrMethod::assemble(header(), code).unwrap();
        let lv = analyze(&m);
        assert_eq!(lv.uses[&1], set(&["o", "x"]));
        assert_eq!(lv.live_in[&1], set(&["o", "x"]));
    }

    #[test]
    fn render_lists_every_instruction() {
        let m = counting_loop();
        let text = analyze(&m).render(&m);
        assert_eq!(text.lines().count(), m.instructions.len() + 2);
        assert!(text.contains("out{i, n, s}"));
    }
}
