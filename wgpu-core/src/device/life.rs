//! Suspected-resource triage: deciding, once a resource's user-facing handle
//! has been dropped, whether the device's [`Tracker`] was its last owner and
//! if so recursing into whatever it in turn kept alive.
//!
//! Trimmed from the real `wgpu-core` module of the same name down to the
//! part that actually exercises the tracker (`ResourceTracker::
//! remove_abandoned`, [`crate::binding_model::BindGroupStates`],
//! [`crate::command::RenderBundleScope`]): buffer mapping, staging-buffer
//! upload, and queue/command-allocator bookkeeping belong to the resource
//! and HAL layers this repository does not reconstruct (spec.md §1). See
//! `DESIGN.md` for the full list of what was dropped.

use std::sync::Arc;

use crate::{
    binding_model::{BindGroup, BindGroupLayout},
    command::RenderBundle,
    hal_api::HalApi,
    lock::Mutex,
    pipeline::{ComputePipeline, PipelineLayout, RenderPipeline},
    resource::{Buffer, QuerySet, Resource, Sampler, Texture, TextureView},
    track::{ResourceTracker, Tracker, TrackerIndex},
    FastHashMap, SubmissionIndex,
};

/// Resources no longer reachable from the user, grouped by class. A
/// resource lands here once its last strong reference outside the device's
/// own tracker has gone away; [`LifetimeTracker::triage_suspected`] is what
/// actually checks whether the tracker agrees.
pub(crate) struct ResourceMaps<A: HalApi> {
    pub buffers: FastHashMap<TrackerIndex, Arc<Buffer<A>>>,
    pub textures: FastHashMap<TrackerIndex, Arc<Texture<A>>>,
    pub texture_views: FastHashMap<TrackerIndex, Arc<TextureView<A>>>,
    pub samplers: FastHashMap<TrackerIndex, Arc<Sampler<A>>>,
    pub bind_groups: FastHashMap<TrackerIndex, Arc<BindGroup<A>>>,
    pub bind_group_layouts: FastHashMap<TrackerIndex, Arc<BindGroupLayout<A>>>,
    pub render_pipelines: FastHashMap<TrackerIndex, Arc<RenderPipeline<A>>>,
    pub compute_pipelines: FastHashMap<TrackerIndex, Arc<ComputePipeline<A>>>,
    pub pipeline_layouts: FastHashMap<TrackerIndex, Arc<PipelineLayout<A>>>,
    pub render_bundles: FastHashMap<TrackerIndex, Arc<RenderBundle<A>>>,
    pub query_sets: FastHashMap<TrackerIndex, Arc<QuerySet<A>>>,
}

impl<A: HalApi> ResourceMaps<A> {
    pub(crate) fn new() -> Self {
        Self {
            buffers: FastHashMap::default(),
            textures: FastHashMap::default(),
            texture_views: FastHashMap::default(),
            samplers: FastHashMap::default(),
            bind_groups: FastHashMap::default(),
            bind_group_layouts: FastHashMap::default(),
            render_pipelines: FastHashMap::default(),
            compute_pipelines: FastHashMap::default(),
            pipeline_layouts: FastHashMap::default(),
            render_bundles: FastHashMap::default(),
            query_sets: FastHashMap::default(),
        }
    }
}

impl<A: HalApi> Default for ResourceMaps<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// The resources one in-flight queue submission is still keeping alive.
///
/// Real `wgpu-core` also holds the submission's command encoders and
/// "work done" closures here; those belong to the queue/command-allocator
/// machinery this repository doesn't reconstruct, so only the resource map
/// survives the trim.
struct ActiveSubmission<A: HalApi> {
    index: SubmissionIndex,
    last_resources: ResourceMaps<A>,
}

/// Per-device bookkeeping for resources whose user handle has died.
///
/// `suspected_resources` accumulates candidates; `triage_suspected` walks
/// them in dependency order (bundles and pipelines first, buffers and
/// textures last) so that, e.g., a render bundle's only reference to a
/// buffer is accounted for before the buffer itself is checked.
pub(crate) struct LifetimeTracker<A: HalApi> {
    pub suspected_resources: ResourceMaps<A>,
    active: Vec<ActiveSubmission<A>>,
}

impl<A: HalApi> LifetimeTracker<A> {
    pub fn new() -> Self {
        Self {
            suspected_resources: ResourceMaps::new(),
            active: Vec::new(),
        }
    }

    pub fn queue_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Starts tracking a new queue submission's resource set.
    pub fn track_submission(&mut self, index: SubmissionIndex) {
        self.active.push(ActiveSubmission {
            index,
            last_resources: ResourceMaps::new(),
        });
    }

    /// Drops every submission up to and including `last_done`, releasing
    /// (via their `last_resources` maps going out of scope) anything that
    /// was kept alive only because that submission hadn't completed yet.
    pub fn triage_submissions(&mut self, last_done: SubmissionIndex) {
        profiling::scope!("triage_submissions");
        let done_count = self
            .active
            .iter()
            .position(|a| a.index > last_done)
            .unwrap_or(self.active.len());
        for a in self.active.drain(..done_count) {
            log::debug!("Active submission {} is done", a.index);
        }
    }

    /// For every resource in `resource_map`, asks `trackers` whether it was
    /// that resource's last owner. If so, removes it from `resource_map`,
    /// and either finishes freeing it (no in-flight submission still uses
    /// it) or parks it in the submission that does, via `get_resource_map`.
    fn triage_resources<R, T>(
        resource_map: &mut FastHashMap<TrackerIndex, Arc<R>>,
        active: &mut [ActiveSubmission<A>],
        trackers: &mut T,
        get_resource_map: impl Fn(&mut ResourceMaps<A>) -> &mut FastHashMap<TrackerIndex, Arc<R>>,
    ) -> Vec<Arc<R>>
    where
        R: Resource,
        T: ResourceTracker,
    {
        let mut removed_resources = Vec::new();
        resource_map.retain(|&index, resource| {
            let submit_index = resource.as_info().submission_index();
            let still_in_flight = active.iter_mut().find(|a| a.index == submit_index);

            let is_removed = trackers.remove_abandoned(index);
            if is_removed {
                removed_resources.push(resource.clone());
                if let Some(submission) = still_in_flight {
                    get_resource_map(&mut submission.last_resources).insert(index, resource.clone());
                }
            }
            !is_removed
        });
        removed_resources
    }

    fn triage_suspected_render_bundles(&mut self, trackers: &Mutex<Tracker<A>>) -> &mut Self {
        let mut trackers = trackers.lock();
        let resource_map = &mut self.suspected_resources.render_bundles;
        let mut removed_resources = Self::triage_resources(
            resource_map,
            self.active.as_mut_slice(),
            &mut trackers.bundles,
            |maps| &mut maps.render_bundles,
        );
        removed_resources.drain(..).for_each(|bundle| {
            for v in bundle.used.buffers.write().drain_resources() {
                self.suspected_resources
                    .buffers
                    .insert(v.as_info().tracker_index(), v);
            }
            for v in bundle.used.textures.write().drain_resources() {
                self.suspected_resources
                    .textures
                    .insert(v.as_info().tracker_index(), v);
            }
            for v in bundle.used.bind_groups.write().drain_resources() {
                self.suspected_resources
                    .bind_groups
                    .insert(v.as_info().tracker_index(), v);
            }
            for v in bundle.used.render_pipelines.write().drain_resources() {
                self.suspected_resources
                    .render_pipelines
                    .insert(v.as_info().tracker_index(), v);
            }
            for v in bundle.used.query_sets.write().drain_resources() {
                self.suspected_resources
                    .query_sets
                    .insert(v.as_info().tracker_index(), v);
            }
        });
        self
    }

    fn triage_suspected_bind_groups(&mut self, trackers: &Mutex<Tracker<A>>) -> &mut Self {
        let mut trackers = trackers.lock();
        let resource_map = &mut self.suspected_resources.bind_groups;
        let mut removed_resources = Self::triage_resources(
            resource_map,
            self.active.as_mut_slice(),
            &mut trackers.bind_groups,
            |maps| &mut maps.bind_groups,
        );
        removed_resources.drain(..).for_each(|bind_group| {
            for v in bind_group.used.buffers.write().drain_resources() {
                self.suspected_resources
                    .buffers
                    .insert(v.as_info().tracker_index(), v);
            }
            for v in bind_group.used.textures.write().drain_resources() {
                self.suspected_resources
                    .textures
                    .insert(v.as_info().tracker_index(), v);
            }
            for v in bind_group.used.views.write().drain_resources() {
                self.suspected_resources
                    .texture_views
                    .insert(v.as_info().tracker_index(), v);
            }
            for v in bind_group.used.samplers.write().drain_resources() {
                self.suspected_resources
                    .samplers
                    .insert(v.as_info().tracker_index(), v);
            }
            self.suspected_resources.bind_group_layouts.insert(
                bind_group.layout.as_info().tracker_index(),
                bind_group.layout.clone(),
            );
        });
        self
    }

    fn triage_suspected_texture_views(&mut self, trackers: &Mutex<Tracker<A>>) -> &mut Self {
        let mut trackers = trackers.lock();
        let resource_map = &mut self.suspected_resources.texture_views;
        Self::triage_resources(
            resource_map,
            self.active.as_mut_slice(),
            &mut trackers.views,
            |maps| &mut maps.texture_views,
        );
        self
    }

    fn triage_suspected_textures(&mut self, trackers: &Mutex<Tracker<A>>) -> &mut Self {
        let mut trackers = trackers.lock();
        let resource_map = &mut self.suspected_resources.textures;
        Self::triage_resources(
            resource_map,
            self.active.as_mut_slice(),
            &mut trackers.textures,
            |maps| &mut maps.textures,
        );
        self
    }

    fn triage_suspected_samplers(&mut self, trackers: &Mutex<Tracker<A>>) -> &mut Self {
        let mut trackers = trackers.lock();
        let resource_map = &mut self.suspected_resources.samplers;
        Self::triage_resources(
            resource_map,
            self.active.as_mut_slice(),
            &mut trackers.samplers,
            |maps| &mut maps.samplers,
        );
        self
    }

    fn triage_suspected_buffers(&mut self, trackers: &Mutex<Tracker<A>>) -> &mut Self {
        let mut trackers = trackers.lock();
        let resource_map = &mut self.suspected_resources.buffers;
        Self::triage_resources(
            resource_map,
            self.active.as_mut_slice(),
            &mut trackers.buffers,
            |maps| &mut maps.buffers,
        );
        self
    }

    fn triage_suspected_compute_pipelines(&mut self, trackers: &Mutex<Tracker<A>>) -> &mut Self {
        let mut trackers = trackers.lock();
        let resource_map = &mut self.suspected_resources.compute_pipelines;
        let mut removed_resources = Self::triage_resources(
            resource_map,
            self.active.as_mut_slice(),
            &mut trackers.compute_pipelines,
            |maps| &mut maps.compute_pipelines,
        );
        removed_resources.drain(..).for_each(|pipeline| {
            self.suspected_resources.pipeline_layouts.insert(
                pipeline.layout.as_info().tracker_index(),
                pipeline.layout.clone(),
            );
        });
        self
    }

    fn triage_suspected_render_pipelines(&mut self, trackers: &Mutex<Tracker<A>>) -> &mut Self {
        let mut trackers = trackers.lock();
        let resource_map = &mut self.suspected_resources.render_pipelines;
        let mut removed_resources = Self::triage_resources(
            resource_map,
            self.active.as_mut_slice(),
            &mut trackers.render_pipelines,
            |maps| &mut maps.render_pipelines,
        );
        removed_resources.drain(..).for_each(|pipeline| {
            self.suspected_resources.pipeline_layouts.insert(
                pipeline.layout.as_info().tracker_index(),
                pipeline.layout.clone(),
            );
        });
        self
    }

    fn triage_suspected_pipeline_layouts(&mut self) -> &mut Self {
        let mut removed_resources = Vec::new();
        self.suspected_resources
            .pipeline_layouts
            .retain(|_, pipeline_layout| {
                removed_resources.push(pipeline_layout.clone());
                false
            });
        removed_resources.drain(..).for_each(|pipeline_layout| {
            for bgl in &pipeline_layout.bind_group_layouts {
                self.suspected_resources
                    .bind_group_layouts
                    .insert(bgl.as_info().tracker_index(), bgl.clone());
            }
        });
        self
    }

    fn triage_suspected_bind_group_layouts(&mut self) -> &mut Self {
        // Must run after suspected pipelines are triaged; nothing else can
        // bump a bind-group layout's refcount while this device is locked.
        self.suspected_resources.bind_group_layouts.clear();
        self
    }

    fn triage_suspected_query_sets(&mut self, trackers: &Mutex<Tracker<A>>) -> &mut Self {
        let mut trackers = trackers.lock();
        let resource_map = &mut self.suspected_resources.query_sets;
        Self::triage_resources(
            resource_map,
            self.active.as_mut_slice(),
            &mut trackers.query_sets,
            |maps| &mut maps.query_sets,
        );
        self
    }

    /// Walks every suspected resource class in dependency order: resources
    /// that can *own* references to other resources are triaged before the
    /// resources they might be the last owner of, so a single pass suffices
    /// (`wgpu-core`'s resource ownership graph is acyclic).
    pub(crate) fn triage_suspected(&mut self, trackers: &Mutex<Tracker<A>>) {
        profiling::scope!("triage_suspected");
        self.triage_suspected_render_bundles(trackers);
        self.triage_suspected_compute_pipelines(trackers);
        self.triage_suspected_render_pipelines(trackers);
        self.triage_suspected_bind_groups(trackers);
        self.triage_suspected_pipeline_layouts();
        self.triage_suspected_bind_group_layouts();
        self.triage_suspected_query_sets(trackers);
        self.triage_suspected_samplers(trackers);
        self.triage_suspected_texture_views(trackers);
        self.triage_suspected_textures(trackers);
        self.triage_suspected_buffers(trackers);
    }
}

impl<A: HalApi> Default for LifetimeTracker<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        binding_model::BindGroupStates, resource::ResourceInfo,
        track::SharedTrackerIndexAllocator,
    };

    #[derive(Debug)]
    struct FakeApi;
    impl hal::Api for FakeApi {
        type Buffer = ();
        type Texture = ();
    }

    #[test]
    fn queue_empty_tracks_active_submissions() {
        let mut life = LifetimeTracker::<FakeApi>::new();
        assert!(life.queue_empty());

        life.track_submission(1);
        life.track_submission(2);
        assert!(!life.queue_empty());

        life.triage_submissions(1);
        assert!(!life.queue_empty());

        life.triage_submissions(2);
        assert!(life.queue_empty());
    }

    #[test]
    fn triage_suspected_buffers_removes_from_device_tracker() {
        let allocator = SharedTrackerIndexAllocator::new();
        let buffer = Arc::new(Buffer::<FakeApi> {
            raw: (),
            usage: wgt::BufferUsages::empty(),
            info: ResourceInfo::new("buf", &allocator),
        });
        let index = buffer.as_info().tracker_index();

        let mut trackers = Tracker::<FakeApi>::new();
        trackers.buffers.insert(index, hal::BufferUses::empty());
        let trackers = Mutex::new(trackers);

        let mut life = LifetimeTracker::<FakeApi>::new();
        life.suspected_resources.buffers.insert(index, buffer);

        life.triage_suspected(&trackers);

        assert!(!trackers.lock().buffers.is_tracked(index));
        assert!(life.suspected_resources.buffers.is_empty());
    }

    #[test]
    fn triage_suspected_bind_groups_waits_for_device_tracker_to_agree() {
        let allocator = SharedTrackerIndexAllocator::new();
        let layout = Arc::new(BindGroupLayout::<FakeApi>::new("layout", &allocator));
        let bind_group = Arc::new(BindGroup::<FakeApi> {
            info: ResourceInfo::new("bg", &allocator),
            layout,
            used: BindGroupStates::new(),
        });
        let index = bind_group.as_info().tracker_index();

        // The device tracker never saw this bind group (no submission ever
        // referenced it), so it cannot yet be its last owner.
        let trackers = Mutex::new(Tracker::<FakeApi>::new());

        let mut life = LifetimeTracker::<FakeApi>::new();
        life.suspected_resources.bind_groups.insert(index, bind_group);

        life.triage_suspected(&trackers);

        assert!(life.suspected_resources.bind_groups.contains_key(&index));
    }

    #[test]
    fn triage_suspected_pipeline_layouts_cascades_into_bind_group_layouts() {
        let allocator = SharedTrackerIndexAllocator::new();
        let bgl = Arc::new(BindGroupLayout::<FakeApi>::new("bgl", &allocator));
        let bgl_index = bgl.as_info().tracker_index();
        let pipeline_layout = Arc::new(PipelineLayout::new("layout", &allocator, vec![bgl]));
        let pl_index = pipeline_layout.as_info().tracker_index();

        let mut life = LifetimeTracker::<FakeApi>::new();
        life.suspected_resources
            .pipeline_layouts
            .insert(pl_index, pipeline_layout);

        life.triage_suspected_pipeline_layouts();

        assert!(life.suspected_resources.pipeline_layouts.is_empty());
        assert!(life
            .suspected_resources
            .bind_group_layouts
            .contains_key(&bgl_index));
    }

    #[test]
    fn triage_suspected_bind_group_layouts_clears_unconditionally() {
        let allocator = SharedTrackerIndexAllocator::new();
        let bgl = Arc::new(BindGroupLayout::<FakeApi>::new("bgl", &allocator));
        let index = bgl.as_info().tracker_index();

        let mut life = LifetimeTracker::<FakeApi>::new();
        life.suspected_resources.bind_group_layouts.insert(index, bgl);

        life.triage_suspected_bind_group_layouts();

        assert!(life.suspected_resources.bind_group_layouts.is_empty());
    }
}
