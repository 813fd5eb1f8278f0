//! Pipeline objects, kept only for the one thing the tracker's lifetime
//! bookkeeping needs from them: a pipeline keeps its [`PipelineLayout`]
//! (and, through it, the layout's bind-group layouts) alive, so dropping the
//! last pipeline that references a layout can make that layout collectible
//! too. Shader translation, pipeline-state validation, and the actual HAL
//! pipeline object are out of scope.

use std::sync::Arc;

use crate::{
    binding_model::BindGroupLayout,
    hal_api::HalApi,
    resource::{Resource, ResourceInfo},
    track::SharedTrackerIndexAllocator,
};

#[derive(Debug)]
pub struct PipelineLayout<A: HalApi> {
    pub info: ResourceInfo<Self>,
    pub bind_group_layouts: Vec<Arc<BindGroupLayout<A>>>,
}

impl<A: HalApi> PipelineLayout<A> {
    pub fn new(
        label: &str,
        tracker_indices: &SharedTrackerIndexAllocator,
        bind_group_layouts: Vec<Arc<BindGroupLayout<A>>>,
    ) -> Self {
        Self {
            info: ResourceInfo::new(label, tracker_indices),
            bind_group_layouts,
        }
    }
}

impl<A: HalApi> Resource for PipelineLayout<A> {
    fn as_info(&self) -> &ResourceInfo<Self> {
        &self.info
    }
}

#[derive(Debug)]
pub struct RenderPipeline<A: HalApi> {
    pub info: ResourceInfo<Self>,
    pub layout: Arc<PipelineLayout<A>>,
}

impl<A: HalApi> Resource for RenderPipeline<A> {
    fn as_info(&self) -> &ResourceInfo<Self> {
        &self.info
    }
}

#[derive(Debug)]
pub struct ComputePipeline<A: HalApi> {
    pub info: ResourceInfo<Self>,
    pub layout: Arc<PipelineLayout<A>>,
}

impl<A: HalApi> Resource for ComputePipeline<A> {
    fn as_info(&self) -> &ResourceInfo<Self> {
        &self.info
    }
}
