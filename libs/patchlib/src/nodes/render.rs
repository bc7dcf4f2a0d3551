// Copyright (c) 2026 Patchlib Contributors
// SPDX-License-Identifier: MIT

//! Scene construction and rendering nodes.
//!
//! These nodes own GPU-backed resources behind opaque handles minted by
//! the host device. A node keeps the same handle across frames and
//! mutates the resource in place, so changed outputs are sent forced:
//! handle identity alone would hide the mutation from downstream.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::{
    DocumentContext, ExecutionMode, FrameContext, GpuDevice, Node, NodeBehavior, NodeDescriptor,
    NodeRegistration, NodeType, Parameter, ParameterSpec, Port, PortSet, PortSpec, ResourceHandle,
    Result, SceneRenderer, TexturePool, TextureHandle, TimeMode, Value, ValueType, Widget,
};
use crate::register_node_type;

const BOX_TYPE: &str = "patch.box-geometry";
const MATERIAL_TYPE: &str = "patch.basic-material";
const MESH_TYPE: &str = "patch.mesh";
const CAMERA_TYPE: &str = "patch.camera";
const RENDER_TYPE: &str = "patch.render";

fn float_parameter_spec(name: &str, label: &str, default: f32, max: f32) -> ParameterSpec {
    ParameterSpec {
        name: name.into(),
        label: label.into(),
        value_type: ValueType::Float,
        default: Value::Float(default),
        min: Some(0.0),
        max: Some(max),
        step: None,
        widget: Widget::Slider,
        options: vec![],
    }
}

/// Box geometry provider. Holds one geometry resource and rebuilds it
/// when its dimensions change.
pub struct BoxGeometryNode {
    device: Arc<GpuDevice>,
    geometry: Option<ResourceHandle>,
}

impl BoxGeometryNode {
    pub fn registration() -> NodeRegistration {
        let descriptor = NodeDescriptor::new(
            BOX_TYPE,
            "Box Geometry",
            "A box mesh with editable dimensions",
            NodeType::Geometry,
            ExecutionMode::Provider,
            TimeMode::None,
        )
        .with_input(PortSpec::new("width", "Width", ValueType::Float))
        .with_input(PortSpec::new("height", "Height", ValueType::Float))
        .with_input(PortSpec::new("depth", "Depth", ValueType::Float))
        .with_output(PortSpec::new("geometry", "Geometry", ValueType::Geometry))
        .with_parameter(float_parameter_spec("width", "Width", 1.0, 10.0))
        .with_parameter(float_parameter_spec("height", "Height", 1.0, 10.0))
        .with_parameter(float_parameter_spec("depth", "Depth", 1.0, 10.0));

        NodeRegistration::new(descriptor, Self::build)
    }

    fn build(ctx: &DocumentContext) -> Result<Node> {
        Ok(Node::new(
            BOX_TYPE,
            "Box Geometry",
            NodeType::Geometry,
            ExecutionMode::Provider,
            TimeMode::None,
            vec![
                Port::inlet("width", "Width", ValueType::Float),
                Port::inlet("height", "Height", ValueType::Float),
                Port::inlet("depth", "Depth", ValueType::Float),
                Port::outlet("geometry", "Geometry", ValueType::Geometry),
            ],
            vec![
                Parameter::new("width", "Width", Value::Float(1.0)).with_range(0.0, 10.0),
                Parameter::new("height", "Height", Value::Float(1.0)).with_range(0.0, 10.0),
                Parameter::new("depth", "Depth", Value::Float(1.0)).with_range(0.0, 10.0),
            ],
            Box::new(BoxGeometryNode {
                device: ctx.device.clone(),
                geometry: None,
            }),
        ))
    }
}

impl NodeBehavior for BoxGeometryNode {
    fn execute(&mut self, io: &mut PortSet<'_>, _ctx: &mut FrameContext<'_>) -> Result<()> {
        let geometry = *self.geometry.get_or_insert_with(|| self.device.make_resource());
        // Dimensions feed the rebuild of the underlying vertex data;
        // the handle stays stable.
        io.send_forced("geometry", Some(Value::Geometry(geometry)))
    }

    fn stop(&mut self) -> Result<()> {
        self.geometry = None;
        Ok(())
    }
}

register_node_type!(BoxGeometryNode);

/// Flat-color material provider.
pub struct BasicMaterialNode {
    device: Arc<GpuDevice>,
    material: Option<ResourceHandle>,
}

impl BasicMaterialNode {
    pub fn registration() -> NodeRegistration {
        let descriptor = NodeDescriptor::new(
            MATERIAL_TYPE,
            "Basic Material",
            "A flat-color material",
            NodeType::Material,
            ExecutionMode::Provider,
            TimeMode::None,
        )
        .with_input(PortSpec::new("color", "Color", ValueType::Color))
        .with_output(PortSpec::new("material", "Material", ValueType::Material))
        .with_parameter(ParameterSpec {
            name: "color".into(),
            label: "Color".into(),
            value_type: ValueType::Color,
            default: Value::Color([1.0, 1.0, 1.0, 1.0]),
            min: None,
            max: None,
            step: None,
            widget: Widget::ColorPicker,
            options: vec![],
        });

        NodeRegistration::new(descriptor, Self::build)
    }

    fn build(ctx: &DocumentContext) -> Result<Node> {
        Ok(Node::new(
            MATERIAL_TYPE,
            "Basic Material",
            NodeType::Material,
            ExecutionMode::Provider,
            TimeMode::None,
            vec![
                Port::inlet("color", "Color", ValueType::Color),
                Port::outlet("material", "Material", ValueType::Material),
            ],
            vec![
                Parameter::new("color", "Color", Value::Color([1.0, 1.0, 1.0, 1.0]))
                    .with_widget(Widget::ColorPicker),
            ],
            Box::new(BasicMaterialNode {
                device: ctx.device.clone(),
                material: None,
            }),
        ))
    }
}

impl NodeBehavior for BasicMaterialNode {
    fn execute(&mut self, io: &mut PortSet<'_>, _ctx: &mut FrameContext<'_>) -> Result<()> {
        let material = *self.material.get_or_insert_with(|| self.device.make_resource());
        io.send_forced("material", Some(Value::Material(material)))
    }

    fn stop(&mut self) -> Result<()> {
        self.material = None;
        Ok(())
    }
}

register_node_type!(BasicMaterialNode);

/// Combines geometry and material into a scene object.
pub struct MeshNode {
    device: Arc<GpuDevice>,
    object: Option<ResourceHandle>,
}

impl MeshNode {
    pub fn registration() -> NodeRegistration {
        let descriptor = NodeDescriptor::new(
            MESH_TYPE,
            "Mesh",
            "Combines geometry and material into a renderable object",
            NodeType::Object,
            ExecutionMode::Processor,
            TimeMode::None,
        )
        .with_input(PortSpec::new("geometry", "Geometry", ValueType::Geometry))
        .with_input(PortSpec::new("material", "Material", ValueType::Material))
        .with_output(PortSpec::new("object", "Object", ValueType::Object));

        NodeRegistration::new(descriptor, Self::build)
    }

    fn build(ctx: &DocumentContext) -> Result<Node> {
        Ok(Node::new(
            MESH_TYPE,
            "Mesh",
            NodeType::Object,
            ExecutionMode::Processor,
            TimeMode::None,
            vec![
                Port::inlet("geometry", "Geometry", ValueType::Geometry),
                Port::inlet("material", "Material", ValueType::Material),
                Port::outlet("object", "Object", ValueType::Object),
            ],
            vec![],
            Box::new(MeshNode {
                device: ctx.device.clone(),
                object: None,
            }),
        ))
    }
}

impl NodeBehavior for MeshNode {
    fn execute(&mut self, io: &mut PortSet<'_>, _ctx: &mut FrameContext<'_>) -> Result<()> {
        let has_inputs = io.inlet_value("geometry").and_then(Value::as_geometry).is_some()
            && io.inlet_value("material").and_then(Value::as_material).is_some();
        if !has_inputs {
            return io.send("object", None);
        }

        let object = *self.object.get_or_insert_with(|| self.device.make_resource());
        io.send_forced("object", Some(Value::Object(object)))
    }

    fn stop(&mut self) -> Result<()> {
        self.object = None;
        Ok(())
    }
}

register_node_type!(MeshNode);

/// Perspective camera provider.
pub struct CameraNode {
    device: Arc<GpuDevice>,
    camera: Option<ResourceHandle>,
    aspect: f32,
    needs_update: bool,
}

impl CameraNode {
    pub fn registration() -> NodeRegistration {
        let descriptor = NodeDescriptor::new(
            CAMERA_TYPE,
            "Camera",
            "A perspective camera",
            NodeType::Object,
            ExecutionMode::Provider,
            TimeMode::None,
        )
        .with_input(PortSpec::new("position", "Position", ValueType::Vector3))
        .with_input(PortSpec::new("fov", "Field of View", ValueType::Float))
        .with_output(PortSpec::new("camera", "Camera", ValueType::Camera))
        .with_parameter(ParameterSpec {
            name: "position".into(),
            label: "Position".into(),
            value_type: ValueType::Vector3,
            default: Value::Vector3([0.0, 0.0, 5.0]),
            min: None,
            max: None,
            step: None,
            widget: Widget::InputField,
            options: vec![],
        })
        .with_parameter(ParameterSpec {
            name: "fov".into(),
            label: "Field of View".into(),
            value_type: ValueType::Float,
            default: Value::Float(60.0),
            min: Some(1.0),
            max: Some(179.0),
            step: None,
            widget: Widget::Slider,
            options: vec![],
        });

        NodeRegistration::new(descriptor, Self::build)
    }

    fn build(ctx: &DocumentContext) -> Result<Node> {
        Ok(Node::new(
            CAMERA_TYPE,
            "Camera",
            NodeType::Object,
            ExecutionMode::Provider,
            TimeMode::None,
            vec![
                Port::inlet("position", "Position", ValueType::Vector3),
                Port::inlet("fov", "Field of View", ValueType::Float),
                Port::outlet("camera", "Camera", ValueType::Camera),
            ],
            vec![
                Parameter::new("position", "Position", Value::Vector3([0.0, 0.0, 5.0])),
                Parameter::new("fov", "Field of View", Value::Float(60.0)).with_range(1.0, 179.0),
            ],
            Box::new(CameraNode {
                device: ctx.device.clone(),
                camera: None,
                aspect: 1.0,
                needs_update: false,
            }),
        ))
    }
}

impl NodeBehavior for CameraNode {
    fn execute(&mut self, io: &mut PortSet<'_>, _ctx: &mut FrameContext<'_>) -> Result<()> {
        // Position, fov, and the drawable aspect feed the projection
        // rebuild; the handle stays stable.
        self.needs_update = false;
        let camera = *self.camera.get_or_insert_with(|| self.device.make_resource());
        tracing::trace!(aspect = self.aspect, "camera projection updated");
        io.send_forced("camera", Some(Value::Camera(camera)))
    }

    fn stop(&mut self) -> Result<()> {
        self.camera = None;
        Ok(())
    }

    /// The projection depends on the drawable aspect, so a resize
    /// forces one re-emit.
    fn resize(&mut self, size: (f32, f32), _scale_factor: f32) {
        if size.1 > 0.0 {
            self.aspect = size.0 / size.1;
            self.needs_update = true;
        }
    }

    fn always_dirty(&self) -> bool {
        self.needs_update
    }
}

register_node_type!(CameraNode);

/// Terminal render node: draws a scene object with a camera into a
/// pooled texture and emits the texture.
pub struct RenderNode {
    renderer: Arc<Mutex<dyn SceneRenderer>>,
    pool: Arc<Mutex<TexturePool>>,
    previous: Option<TextureHandle>,
}

impl RenderNode {
    pub fn registration() -> NodeRegistration {
        let descriptor = NodeDescriptor::new(
            RENDER_TYPE,
            "Render",
            "Draws an object with a camera and emits the rendered image",
            NodeType::Renderer,
            ExecutionMode::Consumer,
            TimeMode::None,
        )
        .with_input(PortSpec::new("object", "Object", ValueType::Object))
        .with_input(PortSpec::new("camera", "Camera", ValueType::Camera))
        .with_output(PortSpec::new("image", "Image", ValueType::Image));

        NodeRegistration::new(descriptor, Self::build)
    }

    fn build(ctx: &DocumentContext) -> Result<Node> {
        Ok(Node::new(
            RENDER_TYPE,
            "Render",
            NodeType::Renderer,
            ExecutionMode::Consumer,
            TimeMode::None,
            vec![
                Port::inlet("object", "Object", ValueType::Object),
                Port::inlet("camera", "Camera", ValueType::Camera),
                Port::outlet("image", "Image", ValueType::Image),
            ],
            vec![],
            Box::new(RenderNode {
                renderer: ctx.renderer.clone(),
                pool: ctx.texture_pool.clone(),
                previous: None,
            }),
        ))
    }

    fn release_previous(&mut self) {
        if let Some(texture) = self.previous.take() {
            self.pool.lock().release(texture);
        }
    }
}

impl NodeBehavior for RenderNode {
    fn execute(&mut self, io: &mut PortSet<'_>, ctx: &mut FrameContext<'_>) -> Result<()> {
        let scene = io.inlet_value("object").and_then(Value::as_object);
        let camera = io.inlet_value("camera").and_then(Value::as_camera);
        let (Some(scene), Some(camera)) = (scene, camera) else {
            self.release_previous();
            return io.send("image", None);
        };

        // Last frame's target goes back to the pool first so the draw
        // can recycle the slot instead of growing the pool.
        self.release_previous();
        let texture =
            self.renderer
                .lock()
                .draw(scene, camera, ctx.render_pass, ctx.command_buffer)?;
        self.previous = Some(texture);

        // Forced: a recycled pool slot can compare equal to last
        // frame's handle while holding fresh contents.
        io.send_forced("image", Some(Value::Image(texture)))
    }

    fn stop(&mut self) -> Result<()> {
        self.release_previous();
        Ok(())
    }

    /// Drop the old-extent target so the next draw acquires one
    /// matching the new drawable size.
    fn resize(&mut self, _size: (f32, f32), _scale_factor: f32) {
        self.release_previous();
    }
}

register_node_type!(RenderNode);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        CommandBuffer, EngineConfig, Graph, PatchRuntime, PortRef, RenderPassDescriptor,
    };

    fn frame(runtime: &mut PatchRuntime) {
        let pass = RenderPassDescriptor::new("test", (64, 64));
        let buffer = CommandBuffer::new(0, "test");
        runtime.execute_frame(&pass, &buffer).unwrap();
    }

    fn scene_graph(ctx: &DocumentContext) -> (Graph, crate::core::NodeId) {
        let mut graph = Graph::new("scene");
        let geometry = graph.add_node(BoxGeometryNode::build(ctx).unwrap());
        let material = graph.add_node(BasicMaterialNode::build(ctx).unwrap());
        let mesh = graph.add_node(MeshNode::build(ctx).unwrap());
        let camera = graph.add_node(CameraNode::build(ctx).unwrap());
        let render = graph.add_node(RenderNode::build(ctx).unwrap());

        graph
            .connect(
                PortRef::new(geometry, "geometry"),
                PortRef::new(mesh, "geometry"),
            )
            .unwrap();
        graph
            .connect(
                PortRef::new(material, "material"),
                PortRef::new(mesh, "material"),
            )
            .unwrap();
        graph
            .connect(PortRef::new(mesh, "object"), PortRef::new(render, "object"))
            .unwrap();
        graph
            .connect(
                PortRef::new(camera, "camera"),
                PortRef::new(render, "camera"),
            )
            .unwrap();
        (graph, render)
    }

    #[test]
    fn test_scene_chain_renders_an_image() {
        let ctx = DocumentContext::headless();
        let (graph, render) = scene_graph(&ctx);

        let mut runtime = PatchRuntime::new(graph, ctx, EngineConfig::default());
        runtime.start().unwrap();
        frame(&mut runtime);

        let image = runtime
            .graph()
            .node(render)
            .unwrap()
            .port("image")
            .unwrap()
            .value()
            .cloned();
        assert!(matches!(image, Some(Value::Image(_))));
    }

    #[test]
    fn test_render_recycles_pool_slots_across_frames() {
        let ctx = DocumentContext::headless();
        let pool = ctx.texture_pool.clone();
        let (mut graph, _render) = scene_graph(&ctx);
        // A ticking width keeps the chain dirty every frame.
        let time_factory = crate::nodes::TimeNode::registration().factory;
        let time = graph.add_node(time_factory(&ctx).unwrap());
        let geometry = graph.nodes()[0].id();
        graph
            .connect(PortRef::new(time, "time"), PortRef::new(geometry, "width"))
            .unwrap();

        let mut runtime = PatchRuntime::new(graph, ctx, EngineConfig::default());
        runtime.start().unwrap();
        for _ in 0..5 {
            frame(&mut runtime);
        }

        // One slot handed out, recycled each frame.
        assert_eq!(pool.lock().capacity(), 1);
        assert_eq!(pool.lock().in_use(), 1);
    }

    #[test]
    fn test_resize_forces_camera_reemit() {
        let ctx = DocumentContext::headless();
        let mut graph = Graph::new("test");
        let camera = graph.add_node(CameraNode::build(&ctx).unwrap());

        let mut runtime = PatchRuntime::new(graph, ctx, EngineConfig::default());
        runtime.start().unwrap();
        frame(&mut runtime);
        assert!(!runtime.graph().node(camera).unwrap().is_dirty());

        // A new drawable aspect must reach downstream, so the camera
        // re-runs exactly once and settles again.
        runtime.resize((1280.0, 720.0), 1.0);
        assert!(runtime.graph().node(camera).unwrap().is_dirty());
        frame(&mut runtime);
        assert!(!runtime.graph().node(camera).unwrap().is_dirty());
    }

    #[test]
    fn test_render_without_inputs_emits_nothing() {
        let ctx = DocumentContext::headless();
        let mut graph = Graph::new("test");
        let render = graph.add_node(RenderNode::build(&ctx).unwrap());

        let mut runtime = PatchRuntime::new(graph, ctx, EngineConfig::default());
        runtime.start().unwrap();
        frame(&mut runtime);

        assert!(
            runtime
                .graph()
                .node(render)
                .unwrap()
                .port("image")
                .unwrap()
                .value()
                .is_none()
        );
    }
}
