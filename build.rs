use tonic_build::manual::{Builder, Method, Service};

fn method(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(input)
        .output_type(output)
        .codec_path("tonic::codec::ProstCodec")
        .build()
}

fn main() {
    // Messages live in `src/rpc.rs` as prost derives, so only the service
    // plumbing is generated here and no protoc is needed.
    let master = Service::builder()
        .name("Master")
        .package("mapreduce")
        .method(method(
            "register",
            "Register",
            "crate::rpc::RegisterArgs",
            "crate::rpc::Ack",
        ))
        .build();

    let worker = Service::builder()
        .name("Worker")
        .package("mapreduce")
        .method(method(
            "run_task",
            "RunTask",
            "crate::rpc::RunTaskArgs",
            "crate::rpc::Ack",
        ))
        .method(method(
            "shutdown",
            "Shutdown",
            "crate::rpc::ShutdownArgs",
            "crate::rpc::ShutdownReply",
        ))
        .build();

    Builder::new().compile(&[master, worker]);
    println!("cargo:rerun-if-changed=build.rs");
}
