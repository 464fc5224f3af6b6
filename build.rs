// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
// 构建脚本: 静态 FFmpeg 在 Windows MSVC 下需要额外的系统库
fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    #[cfg(all(target_os = "windows", target_env = "msvc"))]
    {
        // vcpkg 版 FFmpeg 依赖的编解码库
        println!("cargo:rustc-link-lib=dylib=libmfx");
        println!("cargo:rustc-link-lib=dylib=libx264");

        // DirectShow 摄像头采集
        println!("cargo:rustc-link-lib=dylib=strmiids");
        println!("cargo:rustc-link-lib=dylib=ole32");
        println!("cargo:rustc-link-lib=dylib=oleaut32");
        println!("cargo:rustc-link-lib=dylib=vfw32");

        println!("cargo:rustc-link-lib=dylib=secur32");
    }
}
