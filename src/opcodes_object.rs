/// Object system operations for Z-Machine interpreter
///
/// Tree moves (`insert_obj`, `remove_obj`), attribute bits, property
/// access and the short-name printer. The object table layout itself
/// lives behind `ObjectSystem`.
use crate::error::ZResult;
use crate::host::Host;
use crate::instruction::Instruction;
use crate::interpreter::{ExecutionResult, Interpreter};
use crate::opcode_tables::ObjectOp;
use crate::zobject::ObjectSystem;
use log::debug;

impl<H: Host> Interpreter<H> {
    /// Handle object system opcodes
    pub(crate) fn execute_object_op(
        &mut self,
        op: ObjectOp,
        inst: &Instruction,
        operands: &[u16],
    ) -> ZResult<ExecutionResult> {
        let obj = self.operand(operands, 0, inst)?;

        match op {
            ObjectOp::Jin => {
                let container = self.operand(operands, 1, inst)?;
                let parent = self.vm.get_parent(obj)?;
                self.do_branch(inst, parent == container)
            }
            ObjectOp::TestAttr => {
                let attr = self.operand(operands, 1, inst)?;
                let set = self.vm.test_attribute(obj, attr)?;
                self.do_branch(inst, set)
            }
            ObjectOp::SetAttr | ObjectOp::ClearAttr => {
                let attr = self.operand(operands, 1, inst)?;
                self.vm
                    .set_attribute(obj, attr, op == ObjectOp::SetAttr)?;
                Ok(ExecutionResult::Continue)
            }
            ObjectOp::InsertObj => {
                let dest = self.operand(operands, 1, inst)?;
                debug!("insert_obj {} into {}", obj, dest);
                self.vm.insert_object(obj, dest)?;
                Ok(ExecutionResult::Continue)
            }
            ObjectOp::RemoveObj => {
                debug!("remove_obj {}", obj);
                self.vm.remove_object(obj)?;
                Ok(ExecutionResult::Continue)
            }
            ObjectOp::GetProp => {
                let prop = self.operand(operands, 1, inst)?;
                let value = self.vm.get_property(obj, prop)?;
                self.store_result(inst, value)?;
                Ok(ExecutionResult::Continue)
            }
            ObjectOp::GetPropAddr => {
                let prop = self.operand(operands, 1, inst)?;
                let addr = self.vm.get_property_addr(obj, prop)?;
                self.store_result(inst, addr)?;
                Ok(ExecutionResult::Continue)
            }
            ObjectOp::GetNextProp => {
                let prop = self.operand(operands, 1, inst)?;
                let next = self.vm.get_next_property(obj, prop)?;
                self.store_result(inst, next)?;
                Ok(ExecutionResult::Continue)
            }
            ObjectOp::GetPropLen => {
                // Operand is a property data address, not an object
                let len = self.vm.get_property_len(obj);
                self.store_result(inst, len)?;
                Ok(ExecutionResult::Continue)
            }
            ObjectOp::PutProp => {
                let prop = self.operand(operands, 1, inst)?;
                let value = self.operand(operands, 2, inst)?;
                self.vm.put_property(obj, prop, value)?;
                Ok(ExecutionResult::Continue)
            }
            ObjectOp::GetSibling => {
                let sibling = self.vm.get_sibling(obj)?;
                self.store_result(inst, sibling)?;
                self.do_branch(inst, sibling != 0)
            }
            ObjectOp::GetChild => {
                let child = self.vm.get_child(obj)?;
                self.store_result(inst, child)?;
                self.do_branch(inst, child != 0)
            }
            ObjectOp::GetParent => {
                let parent = self.vm.get_parent(obj)?;
                self.store_result(inst, parent)?;
                Ok(ExecutionResult::Continue)
            }
            ObjectOp::PrintObj => {
                let name = self.vm.object_name(obj)?;
                self.output_text(&name)?;
                Ok(ExecutionResult::Continue)
            }
        }
    }
}
