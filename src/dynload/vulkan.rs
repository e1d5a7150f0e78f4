//! Vulkan loader bindings — only the subset needed for a headless compute
//! pipeline: instance/device creation, a storage buffer, a compute pipeline
//! and timestamp queries for GFLOPS timing.

use once_cell::sync::OnceCell;
use std::ffi::c_void;

#[cfg(target_os = "linux")]
const CANDIDATES: &[&str] = &["libvulkan.so.1", "libvulkan.so"];
#[cfg(target_os = "windows")]
const CANDIDATES: &[&str] = &["vulkan-1.dll"];
#[cfg(not(any(target_os = "linux", target_os = "windows")))]
const CANDIDATES: &[&str] = &[];

pub type VkResult = i32;
pub type VkInstance = *mut c_void;
pub type VkPhysicalDevice = *mut c_void;
pub type VkDevice = *mut c_void;
pub type VkQueue = *mut c_void;
pub type VkShaderModule = u64;
pub type VkDescriptorSetLayout = u64;
pub type VkPipelineLayout = u64;
pub type VkPipeline = u64;
pub type VkBuffer = u64;
pub type VkDeviceMemory = u64;
pub type VkDescriptorPool = u64;
pub type VkDescriptorSet = u64;
pub type VkCommandPool = u64;
pub type VkCommandBuffer = *mut c_void;
pub type VkQueryPool = u64;
pub type VkFence = u64;

pub const VK_SUCCESS: VkResult = 0;
pub const VK_QUERY_TYPE_TIMESTAMP: i32 = 2;
pub const VK_PIPELINE_STAGE_TOP_OF_PIPE_BIT: u32 = 0x0000_0001;
pub const VK_PIPELINE_STAGE_BOTTOM_OF_PIPE_BIT: u32 = 0x0000_2000;
pub const VK_BUFFER_USAGE_STORAGE_BUFFER_BIT: u32 = 0x0000_0020;
pub const VK_BUFFER_USAGE_TRANSFER_SRC_BIT: u32 = 0x0000_0001;
pub const VK_BUFFER_USAGE_TRANSFER_DST_BIT: u32 = 0x0000_0002;
pub const VK_MEMORY_PROPERTY_DEVICE_LOCAL_BIT: u32 = 0x0000_0001;
pub const VK_MEMORY_PROPERTY_HOST_VISIBLE_BIT: u32 = 0x0000_0002;
pub const VK_MEMORY_PROPERTY_HOST_COHERENT_BIT: u32 = 0x0000_0004;
pub const VK_DESCRIPTOR_TYPE_STORAGE_BUFFER: i32 = 7;
pub const VK_SHADER_STAGE_COMPUTE_BIT: u32 = 0x0000_0020;
pub const VK_PIPELINE_BIND_POINT_COMPUTE: i32 = 1;
pub const VK_COMMAND_BUFFER_LEVEL_PRIMARY: i32 = 0;
pub const VK_QUEUE_FAMILY_COMPUTE_BIT: u32 = 0x0000_0002;
pub const VK_QUEUE_FAMILY_TRANSFER_BIT: u32 = 0x0000_0004;
pub const VK_QUEUE_FAMILY_GRAPHICS_BIT: u32 = 0x0000_0001;
pub const VK_QUERY_RESULT_64_BIT: u32 = 0x0000_0001;
pub const VK_QUERY_RESULT_WAIT_BIT: u32 = 0x0000_0002;
pub const VK_COMMAND_BUFFER_USAGE_ONE_TIME_SUBMIT_BIT: u32 = 0x0000_0001;
pub const VK_COMMAND_POOL_CREATE_RESET_COMMAND_BUFFER_BIT: u32 = 0x0000_0002;
pub const VK_SHARING_MODE_EXCLUSIVE: i32 = 0;
pub const VK_PIPELINE_STAGE_COMPUTE_SHADER_BIT: u32 = 0x0000_0800;
pub const VK_API_VERSION_1_0: u32 = 1 << 22;

pub const VK_STRUCTURE_TYPE_APPLICATION_INFO: i32 = 0;
pub const VK_STRUCTURE_TYPE_INSTANCE_CREATE_INFO: i32 = 1;
pub const VK_STRUCTURE_TYPE_DEVICE_QUEUE_CREATE_INFO: i32 = 2;
pub const VK_STRUCTURE_TYPE_DEVICE_CREATE_INFO: i32 = 3;
pub const VK_STRUCTURE_TYPE_SUBMIT_INFO: i32 = 4;
pub const VK_STRUCTURE_TYPE_BUFFER_CREATE_INFO: i32 = 12;
pub const VK_STRUCTURE_TYPE_MEMORY_ALLOCATE_INFO: i32 = 5;
pub const VK_STRUCTURE_TYPE_DESCRIPTOR_SET_LAYOUT_CREATE_INFO: i32 = 32;
pub const VK_STRUCTURE_TYPE_PIPELINE_LAYOUT_CREATE_INFO: i32 = 30;
pub const VK_STRUCTURE_TYPE_SHADER_MODULE_CREATE_INFO: i32 = 16;
pub const VK_STRUCTURE_TYPE_COMPUTE_PIPELINE_CREATE_INFO: i32 = 29;
pub const VK_STRUCTURE_TYPE_PIPELINE_SHADER_STAGE_CREATE_INFO: i32 = 18;
pub const VK_STRUCTURE_TYPE_DESCRIPTOR_POOL_CREATE_INFO: i32 = 33;
pub const VK_STRUCTURE_TYPE_DESCRIPTOR_SET_ALLOCATE_INFO: i32 = 34;
pub const VK_STRUCTURE_TYPE_WRITE_DESCRIPTOR_SET: i32 = 35;
pub const VK_STRUCTURE_TYPE_COMMAND_POOL_CREATE_INFO: i32 = 39;
pub const VK_STRUCTURE_TYPE_COMMAND_BUFFER_ALLOCATE_INFO: i32 = 40;
pub const VK_STRUCTURE_TYPE_COMMAND_BUFFER_BEGIN_INFO: i32 = 42;
pub const VK_STRUCTURE_TYPE_QUERY_POOL_CREATE_INFO: i32 = 14;
pub const VK_STRUCTURE_TYPE_FENCE_CREATE_INFO: i32 = 8;

pub struct Api {
    _lib: libloading::Library,
    pub create_instance: unsafe extern "C" fn(*const c_void, *const c_void, *mut VkInstance) -> VkResult,
    pub destroy_instance: unsafe extern "C" fn(VkInstance, *const c_void),
    pub enumerate_physical_devices:
        unsafe extern "C" fn(VkInstance, *mut u32, *mut VkPhysicalDevice) -> VkResult,
    pub get_physical_device_properties: unsafe extern "C" fn(VkPhysicalDevice, *mut c_void),
    pub get_physical_device_queue_family_properties:
        unsafe extern "C" fn(VkPhysicalDevice, *mut u32, *mut c_void),
    pub get_physical_device_memory_properties: unsafe extern "C" fn(VkPhysicalDevice, *mut c_void),
    pub create_device:
        unsafe extern "C" fn(VkPhysicalDevice, *const c_void, *const c_void, *mut VkDevice) -> VkResult,
    pub destroy_device: unsafe extern "C" fn(VkDevice, *const c_void),
    pub device_wait_idle: unsafe extern "C" fn(VkDevice) -> VkResult,
    pub get_device_queue: unsafe extern "C" fn(VkDevice, u32, u32, *mut VkQueue),
    pub queue_wait_idle: unsafe extern "C" fn(VkQueue) -> VkResult,
    pub reset_command_buffer: unsafe extern "C" fn(VkCommandBuffer, u32) -> VkResult,
    pub cmd_copy_buffer: unsafe extern "C" fn(VkCommandBuffer, VkBuffer, VkBuffer, u32, *const c_void),
    pub create_shader_module:
        unsafe extern "C" fn(VkDevice, *const c_void, *const c_void, *mut VkShaderModule) -> VkResult,
    pub destroy_shader_module: unsafe extern "C" fn(VkDevice, VkShaderModule, *const c_void),
    pub create_descriptor_set_layout: unsafe extern "C" fn(
        VkDevice,
        *const c_void,
        *const c_void,
        *mut VkDescriptorSetLayout,
    ) -> VkResult,
    pub destroy_descriptor_set_layout: unsafe extern "C" fn(VkDevice, VkDescriptorSetLayout, *const c_void),
    pub create_pipeline_layout:
        unsafe extern "C" fn(VkDevice, *const c_void, *const c_void, *mut VkPipelineLayout) -> VkResult,
    pub destroy_pipeline_layout: unsafe extern "C" fn(VkDevice, VkPipelineLayout, *const c_void),
    pub create_compute_pipelines: unsafe extern "C" fn(
        VkDevice,
        *mut c_void,
        u32,
        *const c_void,
        *const c_void,
        *mut VkPipeline,
    ) -> VkResult,
    pub destroy_pipeline: unsafe extern "C" fn(VkDevice, VkPipeline, *const c_void),
    pub create_buffer: unsafe extern "C" fn(VkDevice, *const c_void, *const c_void, *mut VkBuffer) -> VkResult,
    pub destroy_buffer: unsafe extern "C" fn(VkDevice, VkBuffer, *const c_void),
    pub get_buffer_memory_requirements: unsafe extern "C" fn(VkDevice, VkBuffer, *mut c_void),
    pub allocate_memory:
        unsafe extern "C" fn(VkDevice, *const c_void, *const c_void, *mut VkDeviceMemory) -> VkResult,
    pub free_memory: unsafe extern "C" fn(VkDevice, VkDeviceMemory, *const c_void),
    pub bind_buffer_memory: unsafe extern "C" fn(VkDevice, VkBuffer, VkDeviceMemory, u64) -> VkResult,
    pub map_memory: unsafe extern "C" fn(
        VkDevice,
        VkDeviceMemory,
        u64,
        u64,
        u32,
        *mut *mut c_void,
    ) -> VkResult,
    pub unmap_memory: unsafe extern "C" fn(VkDevice, VkDeviceMemory),
    pub create_descriptor_pool:
        unsafe extern "C" fn(VkDevice, *const c_void, *const c_void, *mut VkDescriptorPool) -> VkResult,
    pub destroy_descriptor_pool: unsafe extern "C" fn(VkDevice, VkDescriptorPool, *const c_void),
    pub allocate_descriptor_sets:
        unsafe extern "C" fn(VkDevice, *const c_void, *mut VkDescriptorSet) -> VkResult,
    pub update_descriptor_sets:
        unsafe extern "C" fn(VkDevice, u32, *const c_void, u32, *const c_void),
    pub create_command_pool:
        unsafe extern "C" fn(VkDevice, *const c_void, *const c_void, *mut VkCommandPool) -> VkResult,
    pub destroy_command_pool: unsafe extern "C" fn(VkDevice, VkCommandPool, *const c_void),
    pub allocate_command_buffers:
        unsafe extern "C" fn(VkDevice, *const c_void, *mut VkCommandBuffer) -> VkResult,
    pub begin_command_buffer: unsafe extern "C" fn(VkCommandBuffer, *const c_void) -> VkResult,
    pub end_command_buffer: unsafe extern "C" fn(VkCommandBuffer) -> VkResult,
    pub cmd_bind_pipeline: unsafe extern "C" fn(VkCommandBuffer, i32, VkPipeline),
    pub cmd_bind_descriptor_sets: unsafe extern "C" fn(
        VkCommandBuffer,
        i32,
        VkPipelineLayout,
        u32,
        u32,
        *const VkDescriptorSet,
        u32,
        *const u32,
    ),
    pub cmd_dispatch: unsafe extern "C" fn(VkCommandBuffer, u32, u32, u32),
    pub cmd_reset_query_pool: unsafe extern "C" fn(VkCommandBuffer, VkQueryPool, u32, u32),
    pub cmd_write_timestamp: unsafe extern "C" fn(VkCommandBuffer, u32, VkQueryPool, u32),
    pub create_query_pool:
        unsafe extern "C" fn(VkDevice, *const c_void, *const c_void, *mut VkQueryPool) -> VkResult,
    pub destroy_query_pool: unsafe extern "C" fn(VkDevice, VkQueryPool, *const c_void),
    pub get_query_pool_results: unsafe extern "C" fn(
        VkDevice,
        VkQueryPool,
        u32,
        u32,
        usize,
        *mut c_void,
        u64,
        u32,
    ) -> VkResult,
    pub create_fence: unsafe extern "C" fn(VkDevice, *const c_void, *const c_void, *mut VkFence) -> VkResult,
    pub destroy_fence: unsafe extern "C" fn(VkDevice, VkFence, *const c_void),
    pub wait_for_fences: unsafe extern "C" fn(VkDevice, u32, *const VkFence, u32, u64) -> VkResult,
    pub queue_submit: unsafe extern "C" fn(VkQueue, u32, *const c_void, VkFence) -> VkResult,
}

// SAFETY: see dynload::nvml::Api.
unsafe impl Send for Api {}
unsafe impl Sync for Api {}

static API: OnceCell<Result<Api, String>> = OnceCell::new();

fn load() -> Result<Api, String> {
    let lib = super::open_first(CANDIDATES)?;
    // SAFETY: symbol names/signatures match the Vulkan loader ABI
    // (vkGetInstanceProcAddr-free path: these entry points are exported
    // directly by libvulkan/vulkan-1 for instance-independent calls, which
    // every ICD loader in practice does for the core 1.0 command set).
    unsafe {
        Ok(Api {
            create_instance: super::required_symbol(&lib, b"vkCreateInstance\0")?,
            destroy_instance: super::required_symbol(&lib, b"vkDestroyInstance\0")?,
            enumerate_physical_devices: super::required_symbol(
                &lib,
                b"vkEnumeratePhysicalDevices\0",
            )?,
            get_physical_device_properties: super::required_symbol(
                &lib,
                b"vkGetPhysicalDeviceProperties\0",
            )?,
            get_physical_device_queue_family_properties: super::required_symbol(
                &lib,
                b"vkGetPhysicalDeviceQueueFamilyProperties\0",
            )?,
            get_physical_device_memory_properties: super::required_symbol(
                &lib,
                b"vkGetPhysicalDeviceMemoryProperties\0",
            )?,
            create_device: super::required_symbol(&lib, b"vkCreateDevice\0")?,
            destroy_device: super::required_symbol(&lib, b"vkDestroyDevice\0")?,
            device_wait_idle: super::required_symbol(&lib, b"vkDeviceWaitIdle\0")?,
            get_device_queue: super::required_symbol(&lib, b"vkGetDeviceQueue\0")?,
            queue_wait_idle: super::required_symbol(&lib, b"vkQueueWaitIdle\0")?,
            reset_command_buffer: super::required_symbol(&lib, b"vkResetCommandBuffer\0")?,
            cmd_copy_buffer: super::required_symbol(&lib, b"vkCmdCopyBuffer\0")?,
            create_shader_module: super::required_symbol(&lib, b"vkCreateShaderModule\0")?,
            destroy_shader_module: super::required_symbol(&lib, b"vkDestroyShaderModule\0")?,
            create_descriptor_set_layout: super::required_symbol(
                &lib,
                b"vkCreateDescriptorSetLayout\0",
            )?,
            destroy_descriptor_set_layout: super::required_symbol(
                &lib,
                b"vkDestroyDescriptorSetLayout\0",
            )?,
            create_pipeline_layout: super::required_symbol(&lib, b"vkCreatePipelineLayout\0")?,
            destroy_pipeline_layout: super::required_symbol(&lib, b"vkDestroyPipelineLayout\0")?,
            create_compute_pipelines: super::required_symbol(
                &lib,
                b"vkCreateComputePipelines\0",
            )?,
            destroy_pipeline: super::required_symbol(&lib, b"vkDestroyPipeline\0")?,
            create_buffer: super::required_symbol(&lib, b"vkCreateBuffer\0")?,
            destroy_buffer: super::required_symbol(&lib, b"vkDestroyBuffer\0")?,
            get_buffer_memory_requirements: super::required_symbol(
                &lib,
                b"vkGetBufferMemoryRequirements\0",
            )?,
            allocate_memory: super::required_symbol(&lib, b"vkAllocateMemory\0")?,
            free_memory: super::required_symbol(&lib, b"vkFreeMemory\0")?,
            bind_buffer_memory: super::required_symbol(&lib, b"vkBindBufferMemory\0")?,
            map_memory: super::required_symbol(&lib, b"vkMapMemory\0")?,
            unmap_memory: super::required_symbol(&lib, b"vkUnmapMemory\0")?,
            create_descriptor_pool: super::required_symbol(&lib, b"vkCreateDescriptorPool\0")?,
            destroy_descriptor_pool: super::required_symbol(
                &lib,
                b"vkDestroyDescriptorPool\0",
            )?,
            allocate_descriptor_sets: super::required_symbol(
                &lib,
                b"vkAllocateDescriptorSets\0",
            )?,
            update_descriptor_sets: super::required_symbol(&lib, b"vkUpdateDescriptorSets\0")?,
            create_command_pool: super::required_symbol(&lib, b"vkCreateCommandPool\0")?,
            destroy_command_pool: super::required_symbol(&lib, b"vkDestroyCommandPool\0")?,
            allocate_command_buffers: super::required_symbol(
                &lib,
                b"vkAllocateCommandBuffers\0",
            )?,
            begin_command_buffer: super::required_symbol(&lib, b"vkBeginCommandBuffer\0")?,
            end_command_buffer: super::required_symbol(&lib, b"vkEndCommandBuffer\0")?,
            cmd_bind_pipeline: super::required_symbol(&lib, b"vkCmdBindPipeline\0")?,
            cmd_bind_descriptor_sets: super::required_symbol(
                &lib,
                b"vkCmdBindDescriptorSets\0",
            )?,
            cmd_dispatch: super::required_symbol(&lib, b"vkCmdDispatch\0")?,
            cmd_reset_query_pool: super::required_symbol(&lib, b"vkCmdResetQueryPool\0")?,
            cmd_write_timestamp: super::required_symbol(&lib, b"vkCmdWriteTimestamp\0")?,
            create_query_pool: super::required_symbol(&lib, b"vkCreateQueryPool\0")?,
            destroy_query_pool: super::required_symbol(&lib, b"vkDestroyQueryPool\0")?,
            get_query_pool_results: super::required_symbol(&lib, b"vkGetQueryPoolResults\0")?,
            create_fence: super::required_symbol(&lib, b"vkCreateFence\0")?,
            destroy_fence: super::required_symbol(&lib, b"vkDestroyFence\0")?,
            wait_for_fences: super::required_symbol(&lib, b"vkWaitForFences\0")?,
            queue_submit: super::required_symbol(&lib, b"vkQueueSubmit\0")?,
            _lib: lib,
        })
    }
}

pub fn api() -> Option<&'static Api> {
    API.get_or_init(load).as_ref().ok()
}

/// Physical device count, memoized behind a `once`-guarded optional per
/// spec §4.9 ("Vulkan physical-device count is memoized").
static PHYSICAL_DEVICE_COUNT: OnceCell<Option<u32>> = OnceCell::new();

pub fn physical_device_count() -> Option<u32> {
    *PHYSICAL_DEVICE_COUNT.get_or_init(|| {
        let api = api()?;
        let instance = create_minimal_instance(api).ok()?;
        // SAFETY: `instance` was just created above and is destroyed before
        // returning; count query follows the standard two-call enumeration
        // idiom.
        unsafe {
            let mut count: u32 = 0;
            let rc = (api.enumerate_physical_devices)(instance, &mut count, std::ptr::null_mut());
            (api.destroy_instance)(instance, std::ptr::null());
            if rc == VK_SUCCESS {
                Some(count)
            } else {
                None
            }
        }
    })
}

pub fn err_to_string(code: VkResult) -> String {
    format!("Vulkan error {code}")
}

#[repr(C)]
struct VkApplicationInfo {
    s_type: i32,
    p_next: *const c_void,
    p_application_name: *const i8,
    application_version: u32,
    p_engine_name: *const i8,
    engine_version: u32,
    api_version: u32,
}

#[repr(C)]
struct VkInstanceCreateInfo {
    s_type: i32,
    p_next: *const c_void,
    flags: u32,
    p_application_info: *const VkApplicationInfo,
    enabled_layer_count: u32,
    pp_enabled_layer_names: *const *const i8,
    enabled_extension_count: u32,
    pp_enabled_extension_names: *const *const i8,
}

/// Creates a minimal, extension- and layer-free `VkInstance` named "ai-z",
/// shared by every benchmark that needs its own short-lived instance (spec
/// §4.9's Vulkan recipes each create one rather than sharing a long-lived
/// handle).
pub fn create_minimal_instance(api: &Api) -> Result<VkInstance, VkResult> {
    let app_name = b"ai-z\0";
    let app_info = VkApplicationInfo {
        s_type: VK_STRUCTURE_TYPE_APPLICATION_INFO,
        p_next: std::ptr::null(),
        p_application_name: app_name.as_ptr() as *const i8,
        application_version: 1,
        p_engine_name: app_name.as_ptr() as *const i8,
        engine_version: 1,
        api_version: VK_API_VERSION_1_0,
    };
    let create_info = VkInstanceCreateInfo {
        s_type: VK_STRUCTURE_TYPE_INSTANCE_CREATE_INFO,
        p_next: std::ptr::null(),
        flags: 0,
        p_application_info: &app_info,
        enabled_layer_count: 0,
        pp_enabled_layer_names: std::ptr::null(),
        enabled_extension_count: 0,
        pp_enabled_extension_names: std::ptr::null(),
    };
    // SAFETY: `create_info` and the `app_info` it points to are valid stack
    // locals for the duration of this call.
    unsafe {
        let mut instance: VkInstance = std::ptr::null_mut();
        let rc = (api.create_instance)(
            &create_info as *const _ as *const c_void,
            std::ptr::null(),
            &mut instance,
        );
        if rc == VK_SUCCESS {
            Ok(instance)
        } else {
            Err(rc)
        }
    }
}

/// `VkPhysicalDeviceLimits`, field-for-field per the Vulkan spec; only
/// `timestamp_period` is actually read by the compute benchmark, but the
/// layout must match exactly since every field before it shifts its offset.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct VkPhysicalDeviceLimits {
    pub max_image_dimension1_d: u32,
    pub max_image_dimension2_d: u32,
    pub max_image_dimension3_d: u32,
    pub max_image_dimension_cube: u32,
    pub max_image_array_layers: u32,
    pub max_texel_buffer_elements: u32,
    pub max_uniform_buffer_range: u32,
    pub max_storage_buffer_range: u32,
    pub max_push_constants_size: u32,
    pub max_memory_allocation_count: u32,
    pub max_sampler_allocation_count: u32,
    pub buffer_image_granularity: u64,
    pub sparse_address_space_size: u64,
    pub max_bound_descriptor_sets: u32,
    pub max_per_stage_descriptor_samplers: u32,
    pub max_per_stage_descriptor_uniform_buffers: u32,
    pub max_per_stage_descriptor_storage_buffers: u32,
    pub max_per_stage_descriptor_sampled_images: u32,
    pub max_per_stage_descriptor_storage_images: u32,
    pub max_per_stage_descriptor_input_attachments: u32,
    pub max_per_stage_resources: u32,
    pub max_descriptor_set_samplers: u32,
    pub max_descriptor_set_uniform_buffers: u32,
    pub max_descriptor_set_uniform_buffers_dynamic: u32,
    pub max_descriptor_set_storage_buffers: u32,
    pub max_descriptor_set_storage_buffers_dynamic: u32,
    pub max_descriptor_set_sampled_images: u32,
    pub max_descriptor_set_storage_images: u32,
    pub max_descriptor_set_input_attachments: u32,
    pub max_vertex_input_attributes: u32,
    pub max_vertex_input_bindings: u32,
    pub max_vertex_input_attribute_offset: u32,
    pub max_vertex_input_binding_stride: u32,
    pub max_vertex_output_components: u32,
    pub max_tessellation_generation_level: u32,
    pub max_tessellation_patch_size: u32,
    pub max_tessellation_control_per_vertex_input_components: u32,
    pub max_tessellation_control_per_vertex_output_components: u32,
    pub max_tessellation_control_per_patch_output_components: u32,
    pub max_tessellation_control_total_output_components: u32,
    pub max_tessellation_evaluation_input_components: u32,
    pub max_tessellation_evaluation_output_components: u32,
    pub max_geometry_shader_invocations: u32,
    pub max_geometry_input_components: u32,
    pub max_geometry_output_components: u32,
    pub max_geometry_output_vertices: u32,
    pub max_geometry_total_output_components: u32,
    pub max_fragment_input_components: u32,
    pub max_fragment_output_attachments: u32,
    pub max_fragment_dual_src_attachments: u32,
    pub max_fragment_combined_output_resources: u32,
    pub max_compute_shared_memory_size: u32,
    pub max_compute_work_group_count: [u32; 3],
    pub max_compute_work_group_invocations: u32,
    pub max_compute_work_group_size: [u32; 3],
    pub sub_pixel_precision_bits: u32,
    pub sub_texel_precision_bits: u32,
    pub mipmap_precision_bits: u32,
    pub max_draw_indexed_index_value: u32,
    pub max_draw_indirect_count: u32,
    pub max_sampler_lod_bias: f32,
    pub max_sampler_anisotropy: f32,
    pub max_viewports: u32,
    pub max_viewport_dimensions: [u32; 2],
    pub viewport_bounds_range: [f32; 2],
    pub viewport_sub_pixel_bits: u32,
    pub min_memory_map_alignment: usize,
    pub min_texel_buffer_offset_alignment: u64,
    pub min_uniform_buffer_offset_alignment: u64,
    pub min_storage_buffer_offset_alignment: u64,
    pub min_texel_offset: i32,
    pub max_texel_offset: u32,
    pub min_texel_gather_offset: i32,
    pub max_texel_gather_offset: u32,
    pub min_interpolation_offset: f32,
    pub max_interpolation_offset: f32,
    pub sub_pixel_interpolation_offset_bits: u32,
    pub max_framebuffer_width: u32,
    pub max_framebuffer_height: u32,
    pub max_framebuffer_layers: u32,
    pub framebuffer_color_sample_counts: u32,
    pub framebuffer_depth_sample_counts: u32,
    pub framebuffer_stencil_sample_counts: u32,
    pub framebuffer_no_attachments_sample_counts: u32,
    pub max_color_attachments: u32,
    pub sampled_image_color_sample_counts: u32,
    pub sampled_image_integer_sample_counts: u32,
    pub sampled_image_depth_sample_counts: u32,
    pub sampled_image_stencil_sample_counts: u32,
    pub storage_image_sample_counts: u32,
    pub max_sample_mask_words: u32,
    pub timestamp_compute_and_graphics: u32,
    pub timestamp_period: f32,
    pub max_clip_distances: u32,
    pub max_cull_distances: u32,
    pub max_combined_clip_and_cull_distances: u32,
    pub discrete_queue_priorities: u32,
    pub point_size_range: [f32; 2],
    pub line_width_range: [f32; 2],
    pub point_size_granularity: f32,
    pub line_width_granularity: f32,
    pub strict_lines: u32,
    pub standard_sample_locations: u32,
    pub optimal_buffer_copy_offset_alignment: u64,
    pub optimal_buffer_copy_row_pitch_alignment: u64,
    pub non_coherent_atom_size: u64,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct VkPhysicalDeviceSparseProperties {
    pub residency_standard2_d_block_shape: u32,
    pub residency_standard2_d_multisample_block_shape: u32,
    pub residency_standard3_d_block_shape: u32,
    pub residency_aligned_mip_size: u32,
    pub residency_non_resident_strict: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct VkPhysicalDeviceProperties {
    pub api_version: u32,
    pub driver_version: u32,
    pub vendor_id: u32,
    pub device_id: u32,
    pub device_type: i32,
    pub device_name: [u8; 256],
    pub pipeline_cache_uuid: [u8; 16],
    pub limits: VkPhysicalDeviceLimits,
    pub sparse_properties: VkPhysicalDeviceSparseProperties,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct VkQueueFamilyProperties {
    pub queue_flags: u32,
    pub queue_count: u32,
    pub timestamp_valid_bits: u32,
    pub min_image_transfer_granularity: [u32; 3],
}

pub const VK_MEMORY_HEAPS_MAX: usize = 16;
pub const VK_MEMORY_TYPES_MAX: usize = 32;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct VkMemoryType {
    pub property_flags: u32,
    pub heap_index: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct VkMemoryHeap {
    pub size: u64,
    pub flags: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct VkPhysicalDeviceMemoryProperties {
    pub memory_type_count: u32,
    pub memory_types: [VkMemoryType; VK_MEMORY_TYPES_MAX],
    pub memory_heap_count: u32,
    pub memory_heaps: [VkMemoryHeap; VK_MEMORY_HEAPS_MAX],
}

/// Queries the nanoseconds-per-timestamp-tick used to convert the raw query
/// pool counters from `GpuComputeBench` into elapsed seconds (spec §4.9).
pub fn physical_device_timestamp_period(api: &Api, device: VkPhysicalDevice) -> f32 {
    // SAFETY: `props` is zero-initialized and large enough for the struct
    // vkGetPhysicalDeviceProperties writes into.
    unsafe {
        let mut props: VkPhysicalDeviceProperties = std::mem::zeroed();
        (api.get_physical_device_properties)(device, &mut props as *mut _ as *mut c_void);
        props.limits.timestamp_period
    }
}

/// Finds the first queue family that supports compute and has at least one
/// timestamp-valid bit (needed for the `vkCmdWriteTimestamp` pair the bench
/// brackets its dispatch with).
pub fn find_compute_queue_family(api: &Api, device: VkPhysicalDevice) -> Option<u32> {
    const MAX_FAMILIES: usize = 16;
    // SAFETY: two-call idiom; `count` caps the buffer so the second call
    // never writes past `families`.
    unsafe {
        let mut count: u32 = 0;
        (api.get_physical_device_queue_family_properties)(
            device,
            &mut count,
            std::ptr::null_mut(),
        );
        let count = count.min(MAX_FAMILIES as u32);
        let mut families = [std::mem::zeroed::<VkQueueFamilyProperties>(); MAX_FAMILIES];
        (api.get_physical_device_queue_family_properties)(
            device,
            &mut { count } as *mut u32,
            families.as_mut_ptr() as *mut c_void,
        );
        families[..count as usize]
            .iter()
            .position(|f| f.queue_flags & VK_QUEUE_FAMILY_COMPUTE_BIT != 0 && f.timestamp_valid_bits > 0)
            .map(|i| i as u32)
    }
}

/// Finds a transfer-capable queue family, preferring one dedicated to
/// transfer (no graphics bit) over a general-purpose one, per the PCIe
/// bandwidth recipe in spec §4.9.
pub fn find_transfer_queue_family(api: &Api, device: VkPhysicalDevice) -> Option<u32> {
    const MAX_FAMILIES: usize = 16;
    // SAFETY: two-call idiom; `count` caps the buffer so the second call
    // never writes past `families`.
    unsafe {
        let mut count: u32 = 0;
        (api.get_physical_device_queue_family_properties)(
            device,
            &mut count,
            std::ptr::null_mut(),
        );
        let count = count.min(MAX_FAMILIES as u32);
        let mut families = [std::mem::zeroed::<VkQueueFamilyProperties>(); MAX_FAMILIES];
        (api.get_physical_device_queue_family_properties)(
            device,
            &mut { count } as *mut u32,
            families.as_mut_ptr() as *mut c_void,
        );
        let families = &families[..count as usize];
        families
            .iter()
            .position(|f| {
                f.queue_flags & VK_QUEUE_FAMILY_TRANSFER_BIT != 0
                    && f.queue_flags & VK_QUEUE_FAMILY_GRAPHICS_BIT == 0
                    && f.queue_count > 0
            })
            .or_else(|| {
                families
                    .iter()
                    .position(|f| f.queue_flags & VK_QUEUE_FAMILY_TRANSFER_BIT != 0 && f.queue_count > 0)
            })
            .map(|i| i as u32)
    }
}

/// Finds a memory type index matching `required_flags`, scanning
/// `vkGetPhysicalDeviceMemoryProperties`'s result for the storage-buffer
/// allocation (spec §4.9 Vulkan recipe).
pub fn find_memory_type(
    api: &Api,
    device: VkPhysicalDevice,
    type_filter: u32,
    required_flags: u32,
) -> Option<u32> {
    // SAFETY: `props` is zero-initialized POD written in place by the call.
    unsafe {
        let mut props: VkPhysicalDeviceMemoryProperties = std::mem::zeroed();
        (api.get_physical_device_memory_properties)(device, &mut props as *mut _ as *mut c_void);
        (0..props.memory_type_count).find(|&i| {
            let bit_set = (type_filter & (1 << i)) != 0;
            let mt = props.memory_types[i as usize];
            bit_set && (mt.property_flags & required_flags) == required_flags
        })
    }
}
