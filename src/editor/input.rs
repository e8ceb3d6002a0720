//! 输入事件与骨骼编辑控制器

use bitflags::bitflags;
use glam::Vec2;

use super::gizmo::{CoordinateSpace, Gizmo, GizmoAxis, GizmoMode};
use super::picking::{pick_bone, Camera};
use crate::scene::{ComponentHandle, EditTarget, World};

bitflags! {
    /// 鼠标按键
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct MouseButtons: u8 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const MIDDLE = 1 << 2;
    }
}

bitflags! {
    /// 修饰键
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ModifierKeys: u8 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
    }
}

/// 编辑器关心的按键
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// 平移模式
    W,
    /// 旋转模式
    E,
    /// 缩放模式
    R,
    /// 切换局部/世界坐标系
    Q,
    X,
    Y,
    Z,
    Escape,
    Other(u32),
}

/// 与平台无关的输入事件
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    MouseDown { button: MouseButtons, position: Vec2, modifiers: ModifierKeys },
    MouseUp { button: MouseButtons, position: Vec2, modifiers: ModifierKeys },
    MouseMove { position: Vec2, modifiers: ModifierKeys },
    MouseWheel { delta: f32 },
    KeyDown { key: KeyCode, modifiers: ModifierKeys },
    KeyUp { key: KeyCode, modifiers: ModifierKeys },
}

/// 骨骼编辑控制器
///
/// 左键点击拾取骨骼并开始拖动；拖动期间目标骨骼处于交互编辑状态，
/// 物理同步不会覆盖它，松开按键后结束编辑。
#[derive(Debug, Clone)]
pub struct BoneEditorController {
    pub gizmo: Gizmo,
    pub camera: Camera,
    /// 拾取半径（世界单位）
    pub pick_radius: f32,
    target: Option<ComponentHandle>,
    selected_bone: Option<usize>,
    dragging: bool,
    last_cursor: Vec2,
    buttons: MouseButtons,
}

impl Default for BoneEditorController {
    fn default() -> Self {
        Self::new(Camera::default())
    }
}

impl BoneEditorController {
    pub fn new(camera: Camera) -> Self {
        Self {
            gizmo: Gizmo::default(),
            camera,
            pick_radius: 0.05,
            target: None,
            selected_bone: None,
            dragging: false,
            last_cursor: Vec2::ZERO,
            buttons: MouseButtons::empty(),
        }
    }

    /// 切换编辑目标（进行中的拖动先结束）
    pub fn set_target(&mut self, world: &mut World, target: Option<ComponentHandle>) {
        self.finish_drag(world);
        self.target = target;
        self.selected_bone = None;
    }

    pub fn target(&self) -> Option<ComponentHandle> {
        self.target
    }

    pub fn selected_bone(&self) -> Option<usize> {
        self.selected_bone
    }

    pub fn select_bone(&mut self, bone: Option<usize>) {
        self.selected_bone = bone;
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn pressed_buttons(&self) -> MouseButtons {
        self.buttons
    }

    /// 处理一个输入事件，返回是否被消费
    pub fn handle_event(&mut self, world: &mut World, event: &InputEvent) -> bool {
        match *event {
            InputEvent::MouseDown { button, position, .. } => {
                self.buttons |= button;
                self.last_cursor = position;
                if button == MouseButtons::LEFT {
                    self.begin_drag(world, position)
                } else {
                    false
                }
            }
            InputEvent::MouseUp { button, position, .. } => {
                self.buttons.remove(button);
                self.last_cursor = position;
                if button == MouseButtons::LEFT && self.dragging {
                    self.finish_drag(world);
                    true
                } else {
                    false
                }
            }
            InputEvent::MouseMove { position, .. } => {
                let delta = position - self.last_cursor;
                self.last_cursor = position;
                if self.dragging {
                    self.drag(world, delta)
                } else {
                    false
                }
            }
            InputEvent::MouseWheel { delta } => {
                self.zoom(delta);
                true
            }
            InputEvent::KeyDown { key, modifiers } => self.handle_key(world, key, modifiers),
            InputEvent::KeyUp { .. } => false,
        }
    }

    fn begin_drag(&mut self, world: &mut World, cursor: Vec2) -> bool {
        let Some(handle) = self.target else {
            return false;
        };
        let Some(component) = world.component(handle) else {
            self.target = None;
            return false;
        };
        let Some(skeletal) = component.as_skeletal_mesh() else {
            return false;
        };

        let ray = self.camera.screen_ray(cursor);
        let matrices = skeletal.world_bone_matrices(component.component_to_world());
        let picked = pick_bone(&ray, &matrices, self.pick_radius);
        let bone_name = picked.and_then(|i| skeletal.bone_name(i)).map(str::to_string);

        self.selected_bone = picked;
        match bone_name {
            Some(name) => {
                self.dragging = world.begin_interactive_edit(handle, EditTarget::Bone(name));
                true
            }
            None => false,
        }
    }

    fn drag(&mut self, world: &mut World, mouse_delta: Vec2) -> bool {
        let (Some(handle), Some(bone)) = (self.target, self.selected_bone) else {
            return false;
        };
        let Some(component) = world.component_mut(handle) else {
            return false;
        };
        let component_to_world = component.component_to_world();
        let Some(skeletal) = component.as_skeletal_mesh_mut() else {
            return false;
        };
        self.gizmo.apply_drag(skeletal, bone, component_to_world, &self.camera, mouse_delta)
    }

    fn finish_drag(&mut self, world: &mut World) {
        if !self.dragging {
            return;
        }
        self.dragging = false;
        if let Some(handle) = self.target {
            world.end_interactive_edit(handle);
        }
    }

    /// 沿视线推拉相机（不越过目标点）
    fn zoom(&mut self, delta: f32) {
        let offset = self.camera.eye - self.camera.target;
        let distance = (offset.length() * (1.0 - delta * 0.1)).max(0.05);
        self.camera.eye = self.camera.target + offset.normalize_or_zero() * distance;
    }

    fn handle_key(&mut self, world: &mut World, key: KeyCode, modifiers: ModifierKeys) -> bool {
        let axis = match key {
            KeyCode::W => {
                self.gizmo.mode = GizmoMode::Translate;
                return true;
            }
            KeyCode::E => {
                self.gizmo.mode = GizmoMode::Rotate;
                return true;
            }
            KeyCode::R => {
                self.gizmo.mode = GizmoMode::Scale;
                return true;
            }
            KeyCode::Q => {
                self.gizmo.space = self.gizmo.space.toggled();
                return true;
            }
            KeyCode::Escape => {
                self.finish_drag(world);
                self.selected_bone = None;
                self.gizmo.axes = GizmoAxis::ALL;
                return true;
            }
            KeyCode::X => GizmoAxis::X,
            KeyCode::Y => GizmoAxis::Y,
            KeyCode::Z => GizmoAxis::Z,
            KeyCode::Other(_) => return false,
        };

        // Shift + 轴：锁定该轴，操作另外两轴所在平面
        self.gizmo.axes = if modifiers.contains(ModifierKeys::SHIFT) { GizmoAxis::ALL - axis } else { axis };
        true
    }

    pub fn coordinate_space(&self) -> CoordinateSpace {
        self.gizmo.space
    }
}
