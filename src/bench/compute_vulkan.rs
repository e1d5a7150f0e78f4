//! Vulkan PCIe bandwidth and FP32 compute benchmarks (spec §4.9). Each
//! benchmark opens its own short-lived `VkInstance`/`VkDevice` pair — Vulkan
//! compute pipelines have no persistent "context" worth keeping warm across
//! benchmark runs the way a CUDA context does.

use std::ffi::c_void;

use crate::bench::pcie::{Direction, PcieBackend};
use crate::bench::Benchmark;
use crate::dynload::vulkan::{self, VkBuffer, VkCommandBuffer, VkCommandPool, VkDescriptorPool,
    VkDescriptorSet, VkDescriptorSetLayout, VkDevice, VkDeviceMemory, VkFence, VkInstance,
    VkPhysicalDevice, VkPipeline, VkPipelineLayout, VkQueryPool, VkQueue, VkShaderModule};

const FP32_COMPUTE_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/fp32_compute.spv"));
const LOCAL_SIZE: u32 = 256;
const N: u32 = 1 << 20;
const ITERS: u32 = 4096;
const OPS_PER_ITER: f64 = 2.0;

#[repr(C)]
struct VkDeviceQueueCreateInfo {
    s_type: i32,
    p_next: *const c_void,
    flags: u32,
    queue_family_index: u32,
    queue_count: u32,
    p_queue_priorities: *const f32,
}

#[repr(C)]
struct VkDeviceCreateInfo {
    s_type: i32,
    p_next: *const c_void,
    flags: u32,
    queue_create_info_count: u32,
    p_queue_create_infos: *const VkDeviceQueueCreateInfo,
    enabled_layer_count: u32,
    pp_enabled_layer_names: *const *const i8,
    enabled_extension_count: u32,
    pp_enabled_extension_names: *const *const i8,
    p_enabled_features: *const c_void,
}

#[repr(C)]
struct VkBufferCreateInfo {
    s_type: i32,
    p_next: *const c_void,
    flags: u32,
    size: u64,
    usage: u32,
    sharing_mode: i32,
    queue_family_index_count: u32,
    p_queue_family_indices: *const u32,
}

#[repr(C)]
#[derive(Default)]
struct VkMemoryRequirements {
    size: u64,
    alignment: u64,
    memory_type_bits: u32,
}

#[repr(C)]
struct VkMemoryAllocateInfo {
    s_type: i32,
    p_next: *const c_void,
    allocation_size: u64,
    memory_type_index: u32,
}

#[repr(C)]
struct VkCommandPoolCreateInfo {
    s_type: i32,
    p_next: *const c_void,
    flags: u32,
    queue_family_index: u32,
}

#[repr(C)]
struct VkCommandBufferAllocateInfo {
    s_type: i32,
    p_next: *const c_void,
    command_pool: VkCommandPool,
    level: i32,
    command_buffer_count: u32,
}

#[repr(C)]
struct VkCommandBufferBeginInfo {
    s_type: i32,
    p_next: *const c_void,
    flags: u32,
    p_inheritance_info: *const c_void,
}

#[repr(C)]
struct VkSubmitInfo {
    s_type: i32,
    p_next: *const c_void,
    wait_semaphore_count: u32,
    p_wait_semaphores: *const u64,
    p_wait_dst_stage_mask: *const u32,
    command_buffer_count: u32,
    p_command_buffers: *const VkCommandBuffer,
    signal_semaphore_count: u32,
    p_signal_semaphores: *const u64,
}

#[repr(C)]
struct VkFenceCreateInfo {
    s_type: i32,
    p_next: *const c_void,
    flags: u32,
}

#[repr(C)]
struct VkBufferCopy {
    src_offset: u64,
    dst_offset: u64,
    size: u64,
}

#[repr(C)]
struct VkShaderModuleCreateInfo {
    s_type: i32,
    p_next: *const c_void,
    flags: u32,
    code_size: usize,
    p_code: *const u32,
}

#[repr(C)]
struct VkDescriptorSetLayoutBinding {
    binding: u32,
    descriptor_type: i32,
    descriptor_count: u32,
    stage_flags: u32,
    p_immutable_samplers: *const c_void,
}

#[repr(C)]
struct VkDescriptorSetLayoutCreateInfo {
    s_type: i32,
    p_next: *const c_void,
    flags: u32,
    binding_count: u32,
    p_bindings: *const VkDescriptorSetLayoutBinding,
}

#[repr(C)]
struct VkPipelineLayoutCreateInfo {
    s_type: i32,
    p_next: *const c_void,
    flags: u32,
    set_layout_count: u32,
    p_set_layouts: *const VkDescriptorSetLayout,
    push_constant_range_count: u32,
    p_push_constant_ranges: *const c_void,
}

#[repr(C)]
struct VkPipelineShaderStageCreateInfo {
    s_type: i32,
    p_next: *const c_void,
    flags: u32,
    stage: u32,
    module: VkShaderModule,
    p_name: *const i8,
    p_specialization_info: *const c_void,
}

#[repr(C)]
struct VkComputePipelineCreateInfo {
    s_type: i32,
    p_next: *const c_void,
    flags: u32,
    stage: VkPipelineShaderStageCreateInfo,
    layout: VkPipelineLayout,
    base_pipeline_handle: VkPipeline,
    base_pipeline_index: i32,
}

#[repr(C)]
struct VkDescriptorPoolSize {
    descriptor_type: i32,
    descriptor_count: u32,
}

#[repr(C)]
struct VkDescriptorPoolCreateInfo {
    s_type: i32,
    p_next: *const c_void,
    flags: u32,
    max_sets: u32,
    pool_size_count: u32,
    p_pool_sizes: *const VkDescriptorPoolSize,
}

#[repr(C)]
struct VkDescriptorSetAllocateInfo {
    s_type: i32,
    p_next: *const c_void,
    descriptor_pool: VkDescriptorPool,
    descriptor_set_count: u32,
    p_set_layouts: *const VkDescriptorSetLayout,
}

#[repr(C)]
struct VkDescriptorBufferInfo {
    buffer: VkBuffer,
    offset: u64,
    range: u64,
}

#[repr(C)]
struct VkWriteDescriptorSet {
    s_type: i32,
    p_next: *const c_void,
    dst_set: VkDescriptorSet,
    dst_binding: u32,
    dst_array_element: u32,
    descriptor_count: u32,
    descriptor_type: i32,
    p_image_info: *const c_void,
    p_buffer_info: *const VkDescriptorBufferInfo,
    p_texel_buffer_view: *const c_void,
}

#[repr(C)]
struct VkQueryPoolCreateInfo {
    s_type: i32,
    p_next: *const c_void,
    flags: u32,
    query_type: i32,
    query_count: u32,
    pipeline_statistics: u32,
}

fn check(rc: vulkan::VkResult) -> Result<(), String> {
    if rc == vulkan::VK_SUCCESS {
        Ok(())
    } else {
        Err(vulkan::err_to_string(rc))
    }
}

/// Owns an instance/physical-device/device/queue quartet opened for one
/// benchmark run; `Drop` tears them down in reverse order.
struct VulkanDevice {
    instance: VkInstance,
    physical_device: VkPhysicalDevice,
    device: VkDevice,
    queue: VkQueue,
    queue_family: u32,
}

impl VulkanDevice {
    fn new(
        gpu_index: u32,
        find_queue_family: fn(&vulkan::Api, VkPhysicalDevice) -> Option<u32>,
    ) -> Result<(Self, &'static vulkan::Api), String> {
        let api = vulkan::api().ok_or("Vulkan loader unavailable")?;
        let instance = vulkan::create_minimal_instance(api)
            .map_err(|rc| format!("vkCreateInstance failed: {}", vulkan::err_to_string(rc)))?;

        // SAFETY: every out-param is a valid stack local; `instance` is
        // destroyed on every error path below.
        unsafe {
            let mut count: u32 = 0;
            let rc = (api.enumerate_physical_devices)(instance, &mut count, std::ptr::null_mut());
            if rc != vulkan::VK_SUCCESS || count == 0 {
                (api.destroy_instance)(instance, std::ptr::null());
                return Err("no Vulkan physical devices found".to_string());
            }
            if gpu_index >= count {
                (api.destroy_instance)(instance, std::ptr::null());
                return Err(format!("no Vulkan physical device at index {gpu_index}"));
            }

            let mut physical_devices = vec![std::ptr::null_mut(); count as usize];
            (api.enumerate_physical_devices)(instance, &mut count, physical_devices.as_mut_ptr());
            let physical_device = physical_devices[gpu_index as usize];

            let Some(queue_family) = find_queue_family(api, physical_device) else {
                (api.destroy_instance)(instance, std::ptr::null());
                return Err("no suitable Vulkan queue family found".to_string());
            };

            let priority: f32 = 1.0;
            let queue_create_info = VkDeviceQueueCreateInfo {
                s_type: vulkan::VK_STRUCTURE_TYPE_DEVICE_QUEUE_CREATE_INFO,
                p_next: std::ptr::null(),
                flags: 0,
                queue_family_index: queue_family,
                queue_count: 1,
                p_queue_priorities: &priority,
            };
            let device_create_info = VkDeviceCreateInfo {
                s_type: vulkan::VK_STRUCTURE_TYPE_DEVICE_CREATE_INFO,
                p_next: std::ptr::null(),
                flags: 0,
                queue_create_info_count: 1,
                p_queue_create_infos: &queue_create_info,
                enabled_layer_count: 0,
                pp_enabled_layer_names: std::ptr::null(),
                enabled_extension_count: 0,
                pp_enabled_extension_names: std::ptr::null(),
                p_enabled_features: std::ptr::null(),
            };
            let mut device: VkDevice = std::ptr::null_mut();
            let rc = (api.create_device)(
                physical_device,
                &device_create_info as *const _ as *const c_void,
                std::ptr::null(),
                &mut device,
            );
            if rc != vulkan::VK_SUCCESS {
                (api.destroy_instance)(instance, std::ptr::null());
                return Err(format!("vkCreateDevice failed: {}", vulkan::err_to_string(rc)));
            }

            let mut queue: VkQueue = std::ptr::null_mut();
            (api.get_device_queue)(device, queue_family, 0, &mut queue);

            Ok((
                Self {
                    instance,
                    physical_device,
                    device,
                    queue,
                    queue_family,
                },
                api,
            ))
        }
    }

    fn create_buffer(
        &self,
        api: &vulkan::Api,
        size: u64,
        usage: u32,
        memory_properties: u32,
    ) -> Result<(VkBuffer, VkDeviceMemory), String> {
        let buffer_create_info = VkBufferCreateInfo {
            s_type: vulkan::VK_STRUCTURE_TYPE_BUFFER_CREATE_INFO,
            p_next: std::ptr::null(),
            flags: 0,
            size,
            usage,
            sharing_mode: vulkan::VK_SHARING_MODE_EXCLUSIVE,
            queue_family_index_count: 0,
            p_queue_family_indices: std::ptr::null(),
        };
        // SAFETY: out-params are valid stack locals; the buffer/memory are
        // released by the caller once no longer needed.
        unsafe {
            let mut buffer: VkBuffer = 0;
            check((api.create_buffer)(
                self.device,
                &buffer_create_info as *const _ as *const c_void,
                std::ptr::null(),
                &mut buffer,
            ))?;

            let mut requirements = VkMemoryRequirements::default();
            (api.get_buffer_memory_requirements)(
                self.device,
                buffer,
                &mut requirements as *mut _ as *mut c_void,
            );

            let Some(memory_type) = vulkan::find_memory_type(
                api,
                self.physical_device,
                requirements.memory_type_bits,
                memory_properties,
            ) else {
                (api.destroy_buffer)(self.device, buffer, std::ptr::null());
                return Err("no suitable Vulkan memory type".to_string());
            };

            let allocate_info = VkMemoryAllocateInfo {
                s_type: vulkan::VK_STRUCTURE_TYPE_MEMORY_ALLOCATE_INFO,
                p_next: std::ptr::null(),
                allocation_size: requirements.size,
                memory_type_index: memory_type,
            };
            let mut memory: VkDeviceMemory = 0;
            let rc = (api.allocate_memory)(
                self.device,
                &allocate_info as *const _ as *const c_void,
                std::ptr::null(),
                &mut memory,
            );
            if rc != vulkan::VK_SUCCESS {
                (api.destroy_buffer)(self.device, buffer, std::ptr::null());
                return Err(format!("vkAllocateMemory failed: {}", vulkan::err_to_string(rc)));
            }

            let rc = (api.bind_buffer_memory)(self.device, buffer, memory, 0);
            if rc != vulkan::VK_SUCCESS {
                (api.free_memory)(self.device, memory, std::ptr::null());
                (api.destroy_buffer)(self.device, buffer, std::ptr::null());
                return Err(format!("vkBindBufferMemory failed: {}", vulkan::err_to_string(rc)));
            }

            Ok((buffer, memory))
        }
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        if let Some(api) = vulkan::api() {
            // SAFETY: handles were created by this struct and are not used
            // after this point.
            unsafe {
                let _ = (api.device_wait_idle)(self.device);
                (api.destroy_device)(self.device, std::ptr::null());
                (api.destroy_instance)(self.instance, std::ptr::null());
            }
        }
    }
}

/// FP32 FMA compute benchmark: dispatches `N / LOCAL_SIZE` workgroups of an
/// embedded compute shader, timing the dispatch with a timestamp query pair
/// converted to seconds via `timestampPeriod`.
pub struct VulkanComputeBench {
    pub device_index: u32,
}

impl VulkanComputeBench {
    fn run_inner(&self) -> Result<f64, String> {
        let (dev, api) = VulkanDevice::new(self.device_index, vulkan::find_compute_queue_family)?;

        let timestamp_period = vulkan::physical_device_timestamp_period(api, dev.physical_device);
        if timestamp_period <= 0.0 {
            return Err("Vulkan device reports a non-positive timestamp period".to_string());
        }

        // SAFETY: every create-info is a valid stack local scoped to its
        // call; handles are destroyed at the end of this function.
        unsafe {
            let shader_create_info = VkShaderModuleCreateInfo {
                s_type: vulkan::VK_STRUCTURE_TYPE_SHADER_MODULE_CREATE_INFO,
                p_next: std::ptr::null(),
                flags: 0,
                code_size: FP32_COMPUTE_SPV.len(),
                p_code: FP32_COMPUTE_SPV.as_ptr() as *const u32,
            };
            let mut shader: VkShaderModule = 0;
            check((api.create_shader_module)(
                dev.device,
                &shader_create_info as *const _ as *const c_void,
                std::ptr::null(),
                &mut shader,
            ))?;

            let binding = VkDescriptorSetLayoutBinding {
                binding: 0,
                descriptor_type: vulkan::VK_DESCRIPTOR_TYPE_STORAGE_BUFFER,
                descriptor_count: 1,
                stage_flags: vulkan::VK_SHADER_STAGE_COMPUTE_BIT,
                p_immutable_samplers: std::ptr::null(),
            };
            let dsl_create_info = VkDescriptorSetLayoutCreateInfo {
                s_type: vulkan::VK_STRUCTURE_TYPE_DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
                p_next: std::ptr::null(),
                flags: 0,
                binding_count: 1,
                p_bindings: &binding,
            };
            let mut dsl: VkDescriptorSetLayout = 0;
            let rc = (api.create_descriptor_set_layout)(
                dev.device,
                &dsl_create_info as *const _ as *const c_void,
                std::ptr::null(),
                &mut dsl,
            );
            if rc != vulkan::VK_SUCCESS {
                (api.destroy_shader_module)(dev.device, shader, std::ptr::null());
                return Err(format!(
                    "vkCreateDescriptorSetLayout failed: {}",
                    vulkan::err_to_string(rc)
                ));
            }

            let pl_create_info = VkPipelineLayoutCreateInfo {
                s_type: vulkan::VK_STRUCTURE_TYPE_PIPELINE_LAYOUT_CREATE_INFO,
                p_next: std::ptr::null(),
                flags: 0,
                set_layout_count: 1,
                p_set_layouts: &dsl,
                push_constant_range_count: 0,
                p_push_constant_ranges: std::ptr::null(),
            };
            let mut pipeline_layout: VkPipelineLayout = 0;
            let rc = (api.create_pipeline_layout)(
                dev.device,
                &pl_create_info as *const _ as *const c_void,
                std::ptr::null(),
                &mut pipeline_layout,
            );
            if rc != vulkan::VK_SUCCESS {
                (api.destroy_descriptor_set_layout)(dev.device, dsl, std::ptr::null());
                (api.destroy_shader_module)(dev.device, shader, std::ptr::null());
                return Err(format!("vkCreatePipelineLayout failed: {}", vulkan::err_to_string(rc)));
            }

            let entry_point = b"main\0";
            let pipeline_create_info = VkComputePipelineCreateInfo {
                s_type: vulkan::VK_STRUCTURE_TYPE_COMPUTE_PIPELINE_CREATE_INFO,
                p_next: std::ptr::null(),
                flags: 0,
                stage: VkPipelineShaderStageCreateInfo {
                    s_type: vulkan::VK_STRUCTURE_TYPE_PIPELINE_SHADER_STAGE_CREATE_INFO,
                    p_next: std::ptr::null(),
                    flags: 0,
                    stage: vulkan::VK_SHADER_STAGE_COMPUTE_BIT,
                    module: shader,
                    p_name: entry_point.as_ptr() as *const i8,
                    p_specialization_info: std::ptr::null(),
                },
                layout: pipeline_layout,
                base_pipeline_handle: 0,
                base_pipeline_index: -1,
            };
            let mut pipeline: VkPipeline = 0;
            let rc = (api.create_compute_pipelines)(
                dev.device,
                std::ptr::null_mut(),
                1,
                &pipeline_create_info as *const _ as *const c_void,
                std::ptr::null(),
                &mut pipeline,
            );
            if rc != vulkan::VK_SUCCESS {
                (api.destroy_pipeline_layout)(dev.device, pipeline_layout, std::ptr::null());
                (api.destroy_descriptor_set_layout)(dev.device, dsl, std::ptr::null());
                (api.destroy_shader_module)(dev.device, shader, std::ptr::null());
                return Err(format!(
                    "vkCreateComputePipelines failed: {}",
                    vulkan::err_to_string(rc)
                ));
            }

            let bytes = (N as u64) * std::mem::size_of::<f32>() as u64;
            let buffer_result = dev.create_buffer(
                api,
                bytes,
                vulkan::VK_BUFFER_USAGE_STORAGE_BUFFER_BIT,
                vulkan::VK_MEMORY_PROPERTY_DEVICE_LOCAL_BIT,
            );
            let (buffer, memory) = match buffer_result {
                Ok(v) => v,
                Err(e) => {
                    (api.destroy_pipeline)(dev.device, pipeline, std::ptr::null());
                    (api.destroy_pipeline_layout)(dev.device, pipeline_layout, std::ptr::null());
                    (api.destroy_descriptor_set_layout)(dev.device, dsl, std::ptr::null());
                    (api.destroy_shader_module)(dev.device, shader, std::ptr::null());
                    return Err(e);
                }
            };

            let pool_size = VkDescriptorPoolSize {
                descriptor_type: vulkan::VK_DESCRIPTOR_TYPE_STORAGE_BUFFER,
                descriptor_count: 1,
            };
            let dp_create_info = VkDescriptorPoolCreateInfo {
                s_type: vulkan::VK_STRUCTURE_TYPE_DESCRIPTOR_POOL_CREATE_INFO,
                p_next: std::ptr::null(),
                flags: 0,
                max_sets: 1,
                pool_size_count: 1,
                p_pool_sizes: &pool_size,
            };
            let mut descriptor_pool: VkDescriptorPool = 0;
            check((api.create_descriptor_pool)(
                dev.device,
                &dp_create_info as *const _ as *const c_void,
                std::ptr::null(),
                &mut descriptor_pool,
            ))
            .map_err(|e| {
                (api.free_memory)(dev.device, memory, std::ptr::null());
                (api.destroy_buffer)(dev.device, buffer, std::ptr::null());
                (api.destroy_pipeline)(dev.device, pipeline, std::ptr::null());
                (api.destroy_pipeline_layout)(dev.device, pipeline_layout, std::ptr::null());
                (api.destroy_descriptor_set_layout)(dev.device, dsl, std::ptr::null());
                (api.destroy_shader_module)(dev.device, shader, std::ptr::null());
                e
            })?;

            let ds_alloc_info = VkDescriptorSetAllocateInfo {
                s_type: vulkan::VK_STRUCTURE_TYPE_DESCRIPTOR_SET_ALLOCATE_INFO,
                p_next: std::ptr::null(),
                descriptor_pool,
                descriptor_set_count: 1,
                p_set_layouts: &dsl,
            };
            let mut descriptor_set: VkDescriptorSet = 0;
            check((api.allocate_descriptor_sets)(
                dev.device,
                &ds_alloc_info as *const _ as *const c_void,
                &mut descriptor_set,
            ))
            .map_err(|e| {
                (api.destroy_descriptor_pool)(dev.device, descriptor_pool, std::ptr::null());
                (api.free_memory)(dev.device, memory, std::ptr::null());
                (api.destroy_buffer)(dev.device, buffer, std::ptr::null());
                (api.destroy_pipeline)(dev.device, pipeline, std::ptr::null());
                (api.destroy_pipeline_layout)(dev.device, pipeline_layout, std::ptr::null());
                (api.destroy_descriptor_set_layout)(dev.device, dsl, std::ptr::null());
                (api.destroy_shader_module)(dev.device, shader, std::ptr::null());
                e
            })?;

            let buffer_info = VkDescriptorBufferInfo {
                buffer,
                offset: 0,
                range: bytes,
            };
            let write = VkWriteDescriptorSet {
                s_type: vulkan::VK_STRUCTURE_TYPE_WRITE_DESCRIPTOR_SET,
                p_next: std::ptr::null(),
                dst_set: descriptor_set,
                dst_binding: 0,
                dst_array_element: 0,
                descriptor_count: 1,
                descriptor_type: vulkan::VK_DESCRIPTOR_TYPE_STORAGE_BUFFER,
                p_image_info: std::ptr::null(),
                p_buffer_info: &buffer_info,
                p_texel_buffer_view: std::ptr::null(),
            };
            (api.update_descriptor_sets)(
                dev.device,
                1,
                &write as *const _ as *const c_void,
                0,
                std::ptr::null(),
            );

            let cp_create_info = VkCommandPoolCreateInfo {
                s_type: vulkan::VK_STRUCTURE_TYPE_COMMAND_POOL_CREATE_INFO,
                p_next: std::ptr::null(),
                flags: vulkan::VK_COMMAND_POOL_CREATE_RESET_COMMAND_BUFFER_BIT,
                queue_family_index: dev.queue_family,
            };
            let mut command_pool: VkCommandPool = 0;
            check((api.create_command_pool)(
                dev.device,
                &cp_create_info as *const _ as *const c_void,
                std::ptr::null(),
                &mut command_pool,
            ))
            .map_err(|e| {
                (api.destroy_descriptor_pool)(dev.device, descriptor_pool, std::ptr::null());
                (api.free_memory)(dev.device, memory, std::ptr::null());
                (api.destroy_buffer)(dev.device, buffer, std::ptr::null());
                (api.destroy_pipeline)(dev.device, pipeline, std::ptr::null());
                (api.destroy_pipeline_layout)(dev.device, pipeline_layout, std::ptr::null());
                (api.destroy_descriptor_set_layout)(dev.device, dsl, std::ptr::null());
                (api.destroy_shader_module)(dev.device, shader, std::ptr::null());
                e
            })?;

            let cb_alloc_info = VkCommandBufferAllocateInfo {
                s_type: vulkan::VK_STRUCTURE_TYPE_COMMAND_BUFFER_ALLOCATE_INFO,
                p_next: std::ptr::null(),
                command_pool,
                level: vulkan::VK_COMMAND_BUFFER_LEVEL_PRIMARY,
                command_buffer_count: 1,
            };
            let mut command_buffer: VkCommandBuffer = std::ptr::null_mut();
            check((api.allocate_command_buffers)(
                dev.device,
                &cb_alloc_info as *const _ as *const c_void,
                &mut command_buffer,
            ))
            .map_err(|e| {
                (api.destroy_command_pool)(dev.device, command_pool, std::ptr::null());
                (api.destroy_descriptor_pool)(dev.device, descriptor_pool, std::ptr::null());
                (api.free_memory)(dev.device, memory, std::ptr::null());
                (api.destroy_buffer)(dev.device, buffer, std::ptr::null());
                (api.destroy_pipeline)(dev.device, pipeline, std::ptr::null());
                (api.destroy_pipeline_layout)(dev.device, pipeline_layout, std::ptr::null());
                (api.destroy_descriptor_set_layout)(dev.device, dsl, std::ptr::null());
                (api.destroy_shader_module)(dev.device, shader, std::ptr::null());
                e
            })?;

            let qp_create_info = VkQueryPoolCreateInfo {
                s_type: vulkan::VK_STRUCTURE_TYPE_QUERY_POOL_CREATE_INFO,
                p_next: std::ptr::null(),
                flags: 0,
                query_type: vulkan::VK_QUERY_TYPE_TIMESTAMP,
                query_count: 2,
                pipeline_statistics: 0,
            };
            let mut query_pool: VkQueryPool = 0;
            check((api.create_query_pool)(
                dev.device,
                &qp_create_info as *const _ as *const c_void,
                std::ptr::null(),
                &mut query_pool,
            ))
            .map_err(|e| {
                (api.destroy_command_pool)(dev.device, command_pool, std::ptr::null());
                (api.destroy_descriptor_pool)(dev.device, descriptor_pool, std::ptr::null());
                (api.free_memory)(dev.device, memory, std::ptr::null());
                (api.destroy_buffer)(dev.device, buffer, std::ptr::null());
                (api.destroy_pipeline)(dev.device, pipeline, std::ptr::null());
                (api.destroy_pipeline_layout)(dev.device, pipeline_layout, std::ptr::null());
                (api.destroy_descriptor_set_layout)(dev.device, dsl, std::ptr::null());
                (api.destroy_shader_module)(dev.device, shader, std::ptr::null());
                e
            })?;

            let result = (|| -> Result<f64, String> {
                let begin_info = VkCommandBufferBeginInfo {
                    s_type: vulkan::VK_STRUCTURE_TYPE_COMMAND_BUFFER_BEGIN_INFO,
                    p_next: std::ptr::null(),
                    flags: vulkan::VK_COMMAND_BUFFER_USAGE_ONE_TIME_SUBMIT_BIT,
                    p_inheritance_info: std::ptr::null(),
                };
                check((api.begin_command_buffer)(
                    command_buffer,
                    &begin_info as *const _ as *const c_void,
                ))?;

                (api.cmd_reset_query_pool)(command_buffer, query_pool, 0, 2);
                (api.cmd_write_timestamp)(
                    command_buffer,
                    vulkan::VK_PIPELINE_STAGE_COMPUTE_SHADER_BIT,
                    query_pool,
                    0,
                );
                (api.cmd_bind_pipeline)(command_buffer, vulkan::VK_PIPELINE_BIND_POINT_COMPUTE, pipeline);
                (api.cmd_bind_descriptor_sets)(
                    command_buffer,
                    vulkan::VK_PIPELINE_BIND_POINT_COMPUTE,
                    pipeline_layout,
                    0,
                    1,
                    &descriptor_set,
                    0,
                    std::ptr::null(),
                );
                let groups = (N + LOCAL_SIZE - 1) / LOCAL_SIZE;
                (api.cmd_dispatch)(command_buffer, groups, 1, 1);
                (api.cmd_write_timestamp)(
                    command_buffer,
                    vulkan::VK_PIPELINE_STAGE_COMPUTE_SHADER_BIT,
                    query_pool,
                    1,
                );
                check((api.end_command_buffer)(command_buffer))?;

                let fence_create_info = VkFenceCreateInfo {
                    s_type: vulkan::VK_STRUCTURE_TYPE_FENCE_CREATE_INFO,
                    p_next: std::ptr::null(),
                    flags: 0,
                };
                let mut fence: VkFence = 0;
                check((api.create_fence)(
                    dev.device,
                    &fence_create_info as *const _ as *const c_void,
                    std::ptr::null(),
                    &mut fence,
                ))?;

                let submit_info = VkSubmitInfo {
                    s_type: vulkan::VK_STRUCTURE_TYPE_SUBMIT_INFO,
                    p_next: std::ptr::null(),
                    wait_semaphore_count: 0,
                    p_wait_semaphores: std::ptr::null(),
                    p_wait_dst_stage_mask: std::ptr::null(),
                    command_buffer_count: 1,
                    p_command_buffers: &command_buffer,
                    signal_semaphore_count: 0,
                    p_signal_semaphores: std::ptr::null(),
                };
                let submit_result = check((api.queue_submit)(dev.queue, 1, &submit_info as *const _ as *const c_void, fence));
                if submit_result.is_err() {
                    (api.destroy_fence)(dev.device, fence, std::ptr::null());
                    submit_result?;
                }

                const SIXTY_SECONDS_NS: u64 = 60 * 1_000_000_000;
                let wait_result = check((api.wait_for_fences)(dev.device, 1, &fence, 1, SIXTY_SECONDS_NS));
                if wait_result.is_err() {
                    (api.destroy_fence)(dev.device, fence, std::ptr::null());
                    wait_result?;
                }

                let mut timestamps = [0u64; 2];
                let rc = (api.get_query_pool_results)(
                    dev.device,
                    query_pool,
                    0,
                    2,
                    std::mem::size_of_val(&timestamps),
                    timestamps.as_mut_ptr() as *mut c_void,
                    std::mem::size_of::<u64>() as u64,
                    vulkan::VK_QUERY_RESULT_64_BIT | vulkan::VK_QUERY_RESULT_WAIT_BIT,
                );
                (api.destroy_fence)(dev.device, fence, std::ptr::null());
                check(rc)?;

                if timestamps[1] <= timestamps[0] {
                    return Err("invalid Vulkan timestamp delta".to_string());
                }

                let elapsed_seconds =
                    (timestamps[1] - timestamps[0]) as f64 * timestamp_period as f64 * 1e-9;
                if elapsed_seconds <= 0.0 {
                    return Err("non-positive elapsed time measuring Vulkan dispatch".to_string());
                }
                let flops = N as f64 * ITERS as f64 * OPS_PER_ITER;
                Ok(flops / elapsed_seconds / 1e9)
            })();

            (api.destroy_query_pool)(dev.device, query_pool, std::ptr::null());
            (api.destroy_command_pool)(dev.device, command_pool, std::ptr::null());
            (api.destroy_descriptor_pool)(dev.device, descriptor_pool, std::ptr::null());
            (api.free_memory)(dev.device, memory, std::ptr::null());
            (api.destroy_buffer)(dev.device, buffer, std::ptr::null());
            (api.destroy_pipeline)(dev.device, pipeline, std::ptr::null());
            (api.destroy_pipeline_layout)(dev.device, pipeline_layout, std::ptr::null());
            (api.destroy_descriptor_set_layout)(dev.device, dsl, std::ptr::null());
            (api.destroy_shader_module)(dev.device, shader, std::ptr::null());

            result
        }
    }
}

impl Benchmark for VulkanComputeBench {
    fn name(&self) -> &str {
        "Vulkan FLOPS FP32"
    }

    fn is_available(&self) -> bool {
        matches!(vulkan::physical_device_count(), Some(n) if n > 0 && self.device_index < n)
    }

    fn run(&self) -> Result<String, String> {
        let gflops = self.run_inner()?;
        Ok(format!("{gflops:.2} GFLOPS"))
    }
}

/// PCIe H↔D bandwidth via `vkCmdCopyBuffer` between a host-visible/coherent
/// staging buffer and a device-local buffer, timed on the CPU clock since
/// the copy queue rarely supports timestamp queries.
pub struct VulkanPcieBench {
    pub device_index: u32,
}

impl VulkanPcieBench {
    fn copy_once(
        &self,
        api: &vulkan::Api,
        dev: &VulkanDevice,
        command_buffer: VkCommandBuffer,
        staging: VkBuffer,
        device_buf: VkBuffer,
        bytes: u64,
        direction: Direction,
    ) -> Result<f64, String> {
        // SAFETY: every handle passed in was created by the caller and
        // remains valid for this call.
        unsafe {
            (api.reset_command_buffer)(command_buffer, 0);
            let begin_info = VkCommandBufferBeginInfo {
                s_type: vulkan::VK_STRUCTURE_TYPE_COMMAND_BUFFER_BEGIN_INFO,
                p_next: std::ptr::null(),
                flags: vulkan::VK_COMMAND_BUFFER_USAGE_ONE_TIME_SUBMIT_BIT,
                p_inheritance_info: std::ptr::null(),
            };
            check((api.begin_command_buffer)(
                command_buffer,
                &begin_info as *const _ as *const c_void,
            ))?;

            let region = VkBufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size: bytes,
            };
            let (src, dst) = match direction {
                Direction::HostToDevice => (staging, device_buf),
                Direction::DeviceToHost => (device_buf, staging),
            };
            (api.cmd_copy_buffer)(command_buffer, src, dst, 1, &region as *const _ as *const c_void);
            check((api.end_command_buffer)(command_buffer))?;

            let submit_info = VkSubmitInfo {
                s_type: vulkan::VK_STRUCTURE_TYPE_SUBMIT_INFO,
                p_next: std::ptr::null(),
                wait_semaphore_count: 0,
                p_wait_semaphores: std::ptr::null(),
                p_wait_dst_stage_mask: std::ptr::null(),
                command_buffer_count: 1,
                p_command_buffers: &command_buffer,
                signal_semaphore_count: 0,
                p_signal_semaphores: std::ptr::null(),
            };

            let start = std::time::Instant::now();
            check((api.queue_submit)(
                dev.queue,
                1,
                &submit_info as *const _ as *const c_void,
                0,
            ))?;
            check((api.queue_wait_idle)(dev.queue))?;
            let elapsed = start.elapsed().as_secs_f64();

            Ok(elapsed)
        }
    }
}

impl PcieBackend for VulkanPcieBench {
    fn timed_copies(&self, direction: Direction, copies: u32) -> Result<f64, String> {
        let (dev, api) = VulkanDevice::new(self.device_index, vulkan::find_transfer_queue_family)?;
        let bytes = crate::bench::pcie::TRANSFER_BYTES as u64;

        let (staging, staging_mem) = dev.create_buffer(
            api,
            bytes,
            vulkan::VK_BUFFER_USAGE_TRANSFER_SRC_BIT | vulkan::VK_BUFFER_USAGE_TRANSFER_DST_BIT,
            vulkan::VK_MEMORY_PROPERTY_HOST_VISIBLE_BIT | vulkan::VK_MEMORY_PROPERTY_HOST_COHERENT_BIT,
        )?;
        let device_buf_result = dev.create_buffer(
            api,
            bytes,
            vulkan::VK_BUFFER_USAGE_TRANSFER_SRC_BIT | vulkan::VK_BUFFER_USAGE_TRANSFER_DST_BIT,
            vulkan::VK_MEMORY_PROPERTY_DEVICE_LOCAL_BIT,
        );
        // SAFETY: handles created above are torn down on every path below.
        let (device_buf, device_mem) = match device_buf_result {
            Ok(v) => v,
            Err(e) => unsafe {
                (api.free_memory)(dev.device, staging_mem, std::ptr::null());
                (api.destroy_buffer)(dev.device, staging, std::ptr::null());
                return Err(e);
            },
        };

        let result = (|| -> Result<f64, String> {
            // SAFETY: mapped pointer is valid for `bytes` and unmapped
            // immediately after the write.
            unsafe {
                let mut mapped: *mut c_void = std::ptr::null_mut();
                check((api.map_memory)(dev.device, staging_mem, 0, bytes, 0, &mut mapped))?;
                std::ptr::write_bytes(mapped as *mut u8, 0xA5, bytes as usize);
                (api.unmap_memory)(dev.device, staging_mem);
            }

            // SAFETY: pool/buffer are destroyed at the end of this closure.
            unsafe {
                let cp_create_info = VkCommandPoolCreateInfo {
                    s_type: vulkan::VK_STRUCTURE_TYPE_COMMAND_POOL_CREATE_INFO,
                    p_next: std::ptr::null(),
                    flags: vulkan::VK_COMMAND_POOL_CREATE_RESET_COMMAND_BUFFER_BIT,
                    queue_family_index: dev.queue_family,
                };
                let mut command_pool: VkCommandPool = 0;
                check((api.create_command_pool)(
                    dev.device,
                    &cp_create_info as *const _ as *const c_void,
                    std::ptr::null(),
                    &mut command_pool,
                ))?;

                let cb_alloc_info = VkCommandBufferAllocateInfo {
                    s_type: vulkan::VK_STRUCTURE_TYPE_COMMAND_BUFFER_ALLOCATE_INFO,
                    p_next: std::ptr::null(),
                    command_pool,
                    level: vulkan::VK_COMMAND_BUFFER_LEVEL_PRIMARY,
                    command_buffer_count: 1,
                };
                let mut command_buffer: VkCommandBuffer = std::ptr::null_mut();
                let rc = (api.allocate_command_buffers)(
                    dev.device,
                    &cb_alloc_info as *const _ as *const c_void,
                    &mut command_buffer,
                );
                if rc != vulkan::VK_SUCCESS {
                    (api.destroy_command_pool)(dev.device, command_pool, std::ptr::null());
                    return Err(format!(
                        "vkAllocateCommandBuffers failed: {}",
                        vulkan::err_to_string(rc)
                    ));
                }

                let mut total_seconds = 0.0;
                for _ in 0..copies {
                    match self.copy_once(
                        api,
                        &dev,
                        command_buffer,
                        staging,
                        device_buf,
                        bytes,
                        match direction {
                            Direction::HostToDevice => Direction::HostToDevice,
                            Direction::DeviceToHost => Direction::DeviceToHost,
                        },
                    ) {
                        Ok(seconds) => total_seconds += seconds,
                        Err(e) => {
                            (api.destroy_command_pool)(dev.device, command_pool, std::ptr::null());
                            return Err(e);
                        }
                    }
                }

                (api.destroy_command_pool)(dev.device, command_pool, std::ptr::null());
                Ok(total_seconds)
            }
        })();

        // SAFETY: both buffers/memories were created by this call and are no
        // longer used after this point.
        unsafe {
            (api.free_memory)(dev.device, device_mem, std::ptr::null());
            (api.destroy_buffer)(dev.device, device_buf, std::ptr::null());
            (api.free_memory)(dev.device, staging_mem, std::ptr::null());
            (api.destroy_buffer)(dev.device, staging, std::ptr::null());
        }

        result
    }
}

pub struct VulkanPcieAggregateBench {
    pub device_index: u32,
}

impl Benchmark for VulkanPcieAggregateBench {
    fn name(&self) -> &str {
        "Vulkan PCIe bandwidth"
    }

    fn is_available(&self) -> bool {
        matches!(vulkan::physical_device_count(), Some(n) if n > 0 && self.device_index < n)
    }

    fn run(&self) -> Result<String, String> {
        let backend = VulkanPcieBench {
            device_index: self.device_index,
        };
        crate::bench::pcie::bench_aggregate(&backend)
    }
}
