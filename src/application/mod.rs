// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal:
// fine-tune a pretrained encoder on the training split, then
// evaluate it on the test split and write the report.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No argument parsing here (that's Layer 1)
//   - Only workflow coordination and phase diagnostics
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The fine-tune → evaluate → report workflow
pub mod finetune_use_case;
