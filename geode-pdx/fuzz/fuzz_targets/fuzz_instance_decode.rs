#![no_main]

use libfuzzer_sys::fuzz_target;

use geode_pdx::{FieldValue, PdxContext, PdxInstance, PdxInstanceFactory, PdxWriter, Value};

fn seed_types(ctx: &std::sync::Arc<PdxContext>) {
    let mut factory = PdxInstanceFactory::new(ctx, "fuzz.Seed");
    let _ = factory.write_int("int", 0);
    let _ = factory.write_string("string", None);
    let _ = factory.write_object("object", Value::Null);
    let _ = factory.write_long_array("longs", None);
    let _ = factory.write_string_array("strings", None);
    let _ = factory.write_object_array("objects", None);
    let _ = factory.write_array_of_byte_arrays("blobs", None);
    let _ = factory.write_double("double", 0.0);
    let _ = factory.mark_identity_field("int");
    let _ = factory.create();
}

fuzz_target!(|data: &[u8]| {
    let ctx = PdxContext::new_shared();
    seed_types(&ctx);

    let Ok(instance) = PdxInstance::from_bytes(ctx.clone(), data) else {
        return;
    };
    if let Ok(names) = instance.field_names() {
        for name in &names {
            let _ = instance.get_field(name);
        }
    }
    let _ = instance.hashcode();
    let _ = instance.equals(&instance);
    let _ = instance.to_pdx_string();

    let mut writer = instance.create_writer();
    let _ = writer.set_field("int", FieldValue::Int(1));
    let _ = writer.to_bytes();
});
