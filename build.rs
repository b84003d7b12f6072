use spirv_builder::SpirvBuilder;

fn main() {
    SpirvBuilder::new("kernels", "spirv-unknown-vulkan1.1")
        .extra_arg("--no-spirt")
        .build()
        .expect("Kernel failed to compile");
}
