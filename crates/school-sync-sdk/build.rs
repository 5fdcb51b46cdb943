//! 编译期生成 BUILD_TIMESTAMP 等元信息（供 version.rs 使用）

use vergen::EmitBuilder;

fn main() {
    // 生成失败不影响编译，version.rs 使用 option_env! 兜底
    let _ = EmitBuilder::builder().build_timestamp().emit();
}
