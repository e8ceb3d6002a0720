//! World：组件与 Actor 的代际槽位容器

use super::{ActorHandle, ComponentHandle, EditTarget, SceneComponent};

// ============================================================================
// 代际槽位
// ============================================================================

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Debug)]
struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { slots: Vec::new(), free: Vec::new(), len: 0 }
    }
}

impl<T> Arena<T> {
    fn insert(&mut self, value: T) -> (u32, u32) {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return (index, slot.generation);
        }
        self.slots.push(Slot { generation: 0, value: Some(value) });
        ((self.slots.len() - 1) as u32, 0)
    }

    fn get(&self, index: u32, generation: u32) -> Option<&T> {
        self.slots
            .get(index as usize)
            .filter(|s| s.generation == generation)
            .and_then(|s| s.value.as_ref())
    }

    fn get_mut(&mut self, index: u32, generation: u32) -> Option<&mut T> {
        self.slots
            .get_mut(index as usize)
            .filter(|s| s.generation == generation)
            .and_then(|s| s.value.as_mut())
    }

    fn remove(&mut self, index: u32, generation: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize).filter(|s| s.generation == generation)?;
        let value = slot.value.take()?;
        // 代数递增，旧句柄全部失效
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        Some(value)
    }

    fn iter(&self) -> impl Iterator<Item = (u32, u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.value.as_ref().map(|v| (i as u32, s.generation, v)))
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = (u32, u32, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| {
                let generation = s.generation;
                s.value.as_mut().map(|v| (i as u32, generation, v))
            })
    }
}

// ============================================================================
// Actor
// ============================================================================

/// 场景 Actor：组件的逻辑分组
#[derive(Debug, Default)]
pub struct Actor {
    pub name: String,
    components: Vec<ComponentHandle>,
}

impl Actor {
    pub fn components(&self) -> &[ComponentHandle] {
        &self.components
    }
}

// ============================================================================
// World
// ============================================================================

/// 场景容器
#[derive(Debug, Default)]
pub struct World {
    components: Arena<SceneComponent>,
    actors: Arena<Actor>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Actor ==========

    pub fn spawn_actor(&mut self, name: impl Into<String>) -> ActorHandle {
        let (index, generation) = self.actors.insert(Actor { name: name.into(), components: Vec::new() });
        ActorHandle { index, generation }
    }

    pub fn actor(&self, handle: ActorHandle) -> Option<&Actor> {
        self.actors.get(handle.index, handle.generation)
    }

    /// 删除 Actor 及其所有组件
    pub fn destroy_actor(&mut self, handle: ActorHandle) -> bool {
        let Some(actor) = self.actors.remove(handle.index, handle.generation) else {
            return false;
        };
        for component in actor.components {
            self.components.remove(component.index, component.generation);
        }
        true
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len
    }

    // ========== 组件 ==========

    /// 添加组件；component.owner 指向有效 Actor 时同时登记到该 Actor
    pub fn add_component(&mut self, component: SceneComponent) -> ComponentHandle {
        let owner = component.owner;
        let (index, generation) = self.components.insert(component);
        let handle = ComponentHandle { index, generation };
        if let Some(actor) = owner.and_then(|h| self.actors.get_mut(h.index, h.generation)) {
            actor.components.push(handle);
        }
        handle
    }

    /// 添加组件并挂到 Actor 上
    pub fn attach_component(&mut self, actor: ActorHandle, mut component: SceneComponent) -> ComponentHandle {
        component.owner = Some(actor);
        self.add_component(component)
    }

    pub fn remove_component(&mut self, handle: ComponentHandle) -> Option<SceneComponent> {
        let component = self.components.remove(handle.index, handle.generation)?;
        if let Some(actor) = component.owner.and_then(|h| self.actors.get_mut(h.index, h.generation)) {
            actor.components.retain(|c| *c != handle);
        }
        Some(component)
    }

    pub fn component(&self, handle: ComponentHandle) -> Option<&SceneComponent> {
        self.components.get(handle.index, handle.generation)
    }

    pub fn component_mut(&mut self, handle: ComponentHandle) -> Option<&mut SceneComponent> {
        self.components.get_mut(handle.index, handle.generation)
    }

    #[inline]
    pub fn contains_component(&self, handle: ComponentHandle) -> bool {
        self.component(handle).is_some()
    }

    /// 组件所属 Actor（Actor 已删除时为 None）
    pub fn owner_of(&self, handle: ComponentHandle) -> Option<ActorHandle> {
        let owner = self.component(handle)?.owner?;
        self.actor(owner).map(|_| owner)
    }

    pub fn component_count(&self) -> usize {
        self.components.len
    }

    pub fn components(&self) -> impl Iterator<Item = (ComponentHandle, &SceneComponent)> {
        self.components
            .iter()
            .map(|(index, generation, c)| (ComponentHandle { index, generation }, c))
    }

    pub fn components_mut(&mut self) -> impl Iterator<Item = (ComponentHandle, &mut SceneComponent)> {
        self.components
            .iter_mut()
            .map(|(index, generation, c)| (ComponentHandle { index, generation }, c))
    }

    // ========== 交互编辑 ==========

    /// 开始交互编辑：编辑期间该所有者不参与物理推送和回读
    pub fn begin_interactive_edit(&mut self, handle: ComponentHandle, target: EditTarget) -> bool {
        match self.component_mut(handle) {
            Some(component) => {
                component.set_edit(Some(target));
                true
            }
            None => false,
        }
    }

    pub fn end_interactive_edit(&mut self, handle: ComponentHandle) -> bool {
        match self.component_mut(handle) {
            Some(component) if component.is_being_edited() => {
                component.set_edit(None);
                true
            }
            _ => false,
        }
    }

    // ========== 动画阶段 ==========

    /// 推进所有骨骼网格组件的动画，返回姿势有更新的组件数
    ///
    /// 处于交互编辑中的组件暂停动画，避免覆盖 Gizmo 写入的骨骼。
    pub fn tick_animations(&mut self, delta_time: f32) -> usize {
        let mut advanced = 0;
        for (_, component) in self.components_mut() {
            if component.is_being_edited() {
                continue;
            }
            if let Some(skeletal) = component.as_skeletal_mesh_mut() {
                if skeletal.tick_animation(delta_time) {
                    advanced += 1;
                }
            }
        }
        advanced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_handle_after_remove() {
        let mut world = World::new();
        let a = world.add_component(SceneComponent::primitive("a"));
        assert!(world.remove_component(a).is_some());

        // 槽位复用后旧句柄不再解析
        let b = world.add_component(SceneComponent::primitive("b"));
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert!(world.component(a).is_none());
        assert_eq!(world.component(b).map(|c| c.name.as_str()), Some("b"));
    }

    #[test]
    fn test_actor_back_reference_is_weak() {
        let mut world = World::new();
        let actor = world.spawn_actor("hero");
        let c = world.attach_component(actor, SceneComponent::primitive("body"));
        assert_eq!(world.owner_of(c), Some(actor));
        assert_eq!(world.actor(actor).unwrap().components(), &[c]);

        world.remove_component(c);
        assert!(world.actor(actor).unwrap().components().is_empty());

        let orphan = world.add_component(SceneComponent::primitive("orphan"));
        world.component_mut(orphan).unwrap().owner = Some(actor);
        world.destroy_actor(actor);
        assert_eq!(world.owner_of(orphan), None);
    }

    #[test]
    fn test_interactive_edit_flags() {
        let mut world = World::new();
        let c = world.add_component(SceneComponent::primitive("c"));
        assert!(!world.end_interactive_edit(c));

        assert!(world.begin_interactive_edit(c, EditTarget::Bone("arm".into())));
        let component = world.component(c).unwrap();
        assert!(component.is_under_edit(Some("arm")));
        assert!(!component.is_under_edit(Some("leg")));
        assert!(!component.is_under_edit(None));

        assert!(world.end_interactive_edit(c));
        assert!(!world.component(c).unwrap().is_being_edited());
    }
}
