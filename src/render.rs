//! The scene and how a frame of it is drawn.
//!
//! [`SceneContext`] owns everything that was loaded and uploaded: the materials and
//! the models referencing them. [`render`] draws it with the PBR pipeline into the
//! current surface texture, every frame, whether or not anything finished loading.

use std::iter;

use crate::{
    context::Context,
    data_structures::{
        model::{DrawModel, Material, Model},
        object::MaterialId,
    },
};

#[derive(Debug, Default)]
pub struct SceneContext {
    materials: Vec<Material>,
    models: Vec<Model>,
}

impl SceneContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() - 1)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0)
    }

    pub fn add_model(&mut self, model: Model) {
        self.models.push(model);
    }

    pub fn draw<'a>(
        &'a self,
        render_pass: &mut wgpu::RenderPass<'a>,
        camera_bind_group: &'a wgpu::BindGroup,
        light_bind_group: &'a wgpu::BindGroup,
    ) {
        for model in &self.models {
            render_pass.draw_model(model, &self.materials, camera_bind_group, light_bind_group);
        }
    }
}

/// Draws one frame to the window surface.
pub fn render(ctx: &Context) -> Result<(), wgpu::SurfaceError> {
    // Rendering requires the surface to be configured
    if !ctx.is_surface_configured() {
        return Ok(());
    }

    let output = ctx.surface.get_current_texture()?;
    let view = output
        .texture
        .create_view(&wgpu::TextureViewDescriptor::default());

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });
    // With MSAA the pass draws into the multisampled target and resolves into the surface.
    let (target, resolve_target) = match &ctx.msaa_target {
        Some(msaa) => (&msaa.view, Some(&view)),
        None => (&view, None),
    };
    {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(ctx.clear_colour),
                    // the resolved surface keeps the image, the samples can go
                    store: if resolve_target.is_some() {
                        wgpu::StoreOp::Discard
                    } else {
                        wgpu::StoreOp::Store
                    },
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &ctx.depth_texture.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        render_pass.set_pipeline(&ctx.pipeline);
        ctx.scene
            .draw(&mut render_pass, &ctx.camera.bind_group, &ctx.light.bind_group);
    }

    ctx.queue.submit(iter::once(encoder.finish()));
    output.present();
    Ok(())
}
