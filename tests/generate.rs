use dumpity_rs::error::{GenerateError, LayoutError};
use dumpity_rs::generate::{GenerateConfig, Generator};
use dumpity_rs::lower::instructions::{sequence, Constructor, Op};
use dumpity_rs::types::members::{FieldRef, MethodRef};
use dumpity_rs::types::primitive::PrimitiveKind;
use dumpity_rs::types::{Metadata, TypeDef, TypeRef};

fn game_metadata() -> Metadata {
    let player = TypeRef::class(Some("Game"), "Player");
    let weapon = TypeRef::class(Some("Game"), "Weapon");
    let vec3 = TypeRef::value(Some("Game"), "Vector3");
    let object = TypeRef::class(Some("System"), "Object");
    let int = TypeRef::primitive(PrimitiveKind::Int32);
    let float = TypeRef::primitive(PrimitiveKind::Float);

    [
        TypeDef::new(object.clone()).with_method(MethodRef::new(&object, "ToString").at("0x1")),
        TypeDef::new(player.clone())
            .with_field(FieldRef::new(&player, "health", int.clone()).at("0x10"))
            .with_field(FieldRef::new(&player, "weapon", weapon.clone()))
            .with_method(
                MethodRef::new(&player, "TakeDamage")
                    .param("amount", int.clone())
                    .at("0x1000"),
            )
            .with_method(
                MethodRef::new(&player, "Spawn")
                    .static_member()
                    .returns(player.clone())
                    .param("at", vec3.clone())
                    .at("0x2000")
                    .with_body(sequence([
                        Op::LoadConstantFloat32(1.0),
                        Op::LoadConstantFloat32(2.0),
                        Op::NewObject(Constructor {
                            declaring: vec3.clone(),
                            parameter_count: 2,
                        }),
                        Op::StoreLocal(0),
                    ])),
            )
            .with_method(
                MethodRef::new(&player, "Broken")
                    .static_member()
                    .with_body(sequence([Op::StoreLocal(0)])),
            ),
        TypeDef::new(weapon.clone())
            .with_field(FieldRef::new(&weapon, "damage", float.clone()).at("0x18"))
            .with_field(FieldRef::new(&weapon, "owner", player.clone())),
        TypeDef::new(vec3.clone())
            .with_field(FieldRef::new(&vec3, "x", float.clone()))
            .with_field(FieldRef::new(&vec3, "y", float)),
    ]
    .into_iter()
    .collect()
}

#[test]
fn test_generate_writes_header_and_source() {
    let metadata = game_metadata();
    let dir = tempfile::tempdir().unwrap();

    let mut config = GenerateConfig::default();
    config.lowered_name = Some("lowered.c".into());
    let mut generator = Generator::new(&metadata, config);
    let summary = generator.write_to_dir(dir.path()).unwrap();

    assert_eq!(summary.types_scanned, 3);
    assert_eq!(summary.hooks_emitted, 2);
    assert_eq!(summary.structs_written, 3);
    assert_eq!(summary.methods_lowered, 1);

    let header = std::fs::read_to_string(dir.path().join("hooks.h")).unwrap();
    assert!(header.starts_with("#ifndef HOOKS_H\n#define HOOKS_H\n"));
    assert!(header.contains("#include <stdint.h>\n"));
    assert!(header.trim_end().ends_with("#endif"));
    // dependencies are defined before the records embedding them
    let weapon_at = header.find("} Weapon;").unwrap();
    let player_at = header.find("} Player;").unwrap();
    assert!(weapon_at < player_at);
    assert!(header.contains("\tWeapon* weapon;\n"));
    assert!(header.contains("\tvoid* owner;\n"));
    assert!(header.contains("} Vector3;"));

    let source = std::fs::read_to_string(dir.path().join("hooks.c")).unwrap();
    assert!(source.starts_with("#include <android/log.h>\n"));
    assert!(source.contains("#include \"hooks.h\"\n"));
    assert!(source.contains("MAKE_HOOK(Player_TakeDamage, 0x1000, void, Player* self, int amount) {"));
    assert!(source.contains("MAKE_HOOK(Player_Spawn, 0x2000, Player*, Vector3 at) {"));
    assert!(!source.contains("Object_ToString"));
    let take_damage = source.find("INSTALL_HOOK(Player_TakeDamage);").unwrap();
    let spawn = source.find("INSTALL_HOOK(Player_Spawn);").unwrap();
    assert!(take_damage < spawn);
    assert!(source.trim_end().ends_with("\tlog(\"Complete!\");\n}"));

    let lowered = std::fs::read_to_string(dir.path().join("lowered.c")).unwrap();
    assert!(lowered.contains("// Game.Player::Spawn\n"));
    assert!(lowered.contains("\tVector3 _struct_2 = {1.0f, 2.0f};\n\tauto loc_0 = _struct_2;\n"));
    assert!(!lowered.contains("Broken"));
}

#[test]
fn test_only_header_skips_source() {
    let metadata = game_metadata();
    let dir = tempfile::tempdir().unwrap();

    let mut config = GenerateConfig::new("mod.c");
    config.set_only_make_header(true);
    let mut generator = Generator::new(&metadata, config);
    generator.write_to_dir(dir.path()).unwrap();

    assert!(dir.path().join("mod.h").exists());
    assert!(!dir.path().join("mod.c").exists());
    let header = std::fs::read_to_string(dir.path().join("mod.h")).unwrap();
    assert!(header.contains("} Player;"));
}

#[test]
fn test_disabled_parts_are_left_out() {
    let metadata = game_metadata();

    let mut config = GenerateConfig::default();
    config.set_dump_structs(false).set_dump_hook_installation(false);
    let mut generator = Generator::new(&metadata, config);
    generator.collect().unwrap();

    let mut header = vec![];
    generator.write_header(&mut header).unwrap();
    let header = String::from_utf8(header).unwrap();
    assert!(!header.contains("typedef"));

    let mut source = vec![];
    generator.write_source(&mut source).unwrap();
    let source = String::from_utf8(source).unwrap();
    assert!(source.contains("MAKE_HOOK(Player_TakeDamage"));
    assert!(!source.contains("lib_main"));
}

#[test]
fn test_missing_offset_aborts_the_run() {
    let broken = TypeRef::class(Some("Game"), "Broken");
    let metadata: Metadata = [TypeDef::new(broken.clone())
        .with_field(FieldRef::new(&broken, "x", TypeRef::primitive(PrimitiveKind::Int32)))
        .with_method(MethodRef::new(&broken, "Run").at("0x10"))]
    .into_iter()
    .collect();
    let dir = tempfile::tempdir().unwrap();

    let mut generator = Generator::new(&metadata, GenerateConfig::default());
    let err = generator.write_to_dir(dir.path()).unwrap_err();
    assert_eq!(
        err,
        GenerateError::Layout(LayoutError::MissingOffsetAnnotation {
            type_name: "Game.Broken".into(),
            field: "x".into(),
        })
    );
    assert!(!dir.path().join("hooks.c").exists());
}
