//! 编辑器：骨骼拾取与 Gizmo 操作

pub mod gizmo;
pub mod input;
pub mod picking;

pub use gizmo::{apply_delta, CoordinateSpace, Gizmo, GizmoAxis, GizmoDelta, GizmoMode};
pub use input::{BoneEditorController, InputEvent, KeyCode, ModifierKeys, MouseButtons};
pub use picking::{pick_bone, Camera, Projection, Ray};
