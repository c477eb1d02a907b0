//! Tests for the bundled definitions.

use super::*;
use crate::build_type::{BuildGroup, BuildType};
use crate::probe::ToolAvailability;
use crate::session::BuildSession;
use crate::test_utils::Workspace;
use rstest::rstest;
use std::collections::HashSet;
use thirdparty_common::test_support::{ExpectedCall, StubExecutor, success_output};

fn names(platform: Platform) -> Vec<String> {
    all_dependencies(platform)
        .expect("definitions are valid")
        .iter()
        .map(|dep| dep.name().to_owned())
        .collect()
}

#[test]
fn names_are_unique() {
    let names = names(Platform::Linux);
    let unique: HashSet<_> = names.iter().collect();
    assert_eq!(unique.len(), names.len());
}

#[rstest]
#[case::linux(Platform::Linux, true)]
#[case::macos(Platform::MacOs, false)]
fn kerberos_is_linux_only(#[case] platform: Platform, #[case] expected: bool) {
    let names = names(platform);
    assert_eq!(names.contains(&"krb5".to_owned()), expected);
    assert_eq!(names.contains(&"libverto".to_owned()), expected);
}

#[rstest]
#[case::zip("rapidjson", "rapidjson-1.1.0-yb-2.zip", BuildGroup::Common)]
#[case::tarball("bison", "bison-3.4.1.tar.gz", BuildGroup::Common)]
#[case::instrumented("glog", "glog-0.4.0-yb-2.tar.gz", BuildGroup::PotentiallyInstrumented)]
fn descriptors_match_their_releases(
    #[case] name: &str,
    #[case] archive: &str,
    #[case] group: BuildGroup,
) {
    let deps = all_dependencies(Platform::Linux).expect("definitions are valid");
    let dep = deps
        .iter()
        .find(|dep| dep.name() == name)
        .expect("definition exists");

    assert_eq!(dep.descriptor().archive_name(), archive);
    assert_eq!(dep.descriptor().build_group(), group);
}

#[test]
fn glog_adds_sanitizer_specific_flags() {
    let ws = Workspace::new();
    let glog = Glog::new().expect("valid definition");

    let plain = ws.context(BuildType::Uninstrumented);
    let tsan = ws.context(BuildType::Tsan);

    assert_eq!(glog.additional_cmake_args(&plain), ["-DCMAKE_BUILD_TYPE=Release"]);
    assert!(glog.additional_ld_flags(&plain).is_empty());
    assert_eq!(
        glog.additional_cmake_args(&tsan),
        ["-DCMAKE_BUILD_TYPE=Release", "-DBUILD_TESTING=OFF"]
    );
    assert_eq!(glog.additional_ld_flags(&tsan), ["-lpthread"]);
}

#[test]
fn installed_headers_mark_rapidjson_as_built() {
    let ws = Workspace::new();
    let rapidjson = RapidJson::new().expect("valid definition");
    let context = ws.context(BuildType::Common);

    assert!(rapidjson.should_build(&context));
    ws.write("installed/common/include/rapidjson/rapidjson.h", "");
    assert!(!rapidjson.should_build(&context));
}

#[test]
fn jwt_cpp_installs_both_header_trees() {
    let ws = Workspace::new();
    ws.write("src/jwt_cpp-0.6.0/include/jwt-cpp/jwt.h", "");
    ws.write("src/jwt_cpp-0.6.0/include/picojson/picojson.h", "");
    let jwt = JwtCpp::new().expect("valid definition");
    let executor = StubExecutor::default();
    let tools = ToolAvailability::fixed([("ninja", false)]);
    let mut session = BuildSession::new(ws.context(BuildType::Common), &jwt, &executor, &tools);

    jwt.build(&mut session).expect("copy headers");

    let include = ws.layout.installed_prefix(BuildType::Common).join("include");
    assert!(include.join("jwt-cpp/jwt.h").is_file());
    assert!(include.join("picojson/picojson.h").is_file());
    assert!(!jwt.should_build(session.context()));
}

#[test]
fn crypt_blowfish_archives_its_objects() {
    let ws = Workspace::new();
    let build = "build/asan/crypt_blowfish-1.0.0";
    ws.write(&format!("{build}/crypt_blowfish.h"), "");
    ws.write(&format!("{build}/crypt_blowfish.o"), "");
    ws.write(&format!("{build}/wrapper.o"), "");
    // Stands in for the archive `ar` would create.
    ws.write(&format!("{build}/libcrypt_blowfish.a"), "!<arch>\n");
    let dep = CryptBlowfish::new().expect("valid definition");
    let executor = StubExecutor::new(vec![
        ExpectedCall::new("make", ["clean"], Ok(success_output())),
        ExpectedCall::new("make", Vec::<String>::new(), Ok(success_output())),
        ExpectedCall::new(
            "ar",
            ["r", "libcrypt_blowfish.a", "crypt_blowfish.o", "wrapper.o"],
            Ok(success_output()),
        ),
    ]);
    let tools = ToolAvailability::fixed([("ninja", false)]);
    let mut session = BuildSession::new(ws.context(BuildType::Asan), &dep, &executor, &tools);

    dep.build(&mut session).expect("build succeeds");

    executor.assert_finished();
    let prefix = ws.layout.installed_prefix(BuildType::Asan);
    assert!(prefix.join("include/crypt_blowfish/crypt_blowfish.h").is_file());
    assert!(prefix.join("lib/libcrypt_blowfish.a").is_file());
    assert!(!dep.should_build(session.context()));
}

#[rstest]
#[case::present(
    "#define HAVE_LIBZ 1\n  #define HAVE_LIBLZO2 1\n#define VERSION 3\n",
    "#define HAVE_LIBZ 1\n#define VERSION 3\n",
    true
)]
#[case::absent("#define HAVE_LIBZ 1\n", "#define HAVE_LIBZ 1\n", false)]
fn lzo2_define_is_dropped(#[case] input: &str, #[case] output: &str, #[case] found: bool) {
    assert_eq!(
        snappy::without_define(input, "#define HAVE_LIBLZO2 1"),
        (output.to_owned(), found)
    );
}
