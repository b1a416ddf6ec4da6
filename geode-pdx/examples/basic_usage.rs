//! Basic usage example: serializing a domain type and inspecting it
//! without its class.
//!
//! Run with: `RUST_LOG=geode_pdx=trace cargo run --example basic_usage`

use std::sync::Arc;

use geode_pdx::{
    FieldValue, PdxConfig, PdxContext, PdxFieldAccess, PdxInstanceFactory, PdxSerializable,
    PdxSerializer, PdxStatistics, PdxWriter,
};
use geode_pdx_derive::PdxSerializable;

#[derive(Debug, Default, PdxSerializable)]
#[pdx(class_name = "example.Customer")]
struct Customer {
    #[pdx(identity)]
    id: i64,
    name: Option<String>,
    tiers: Vec<i32>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== PDX Basic Usage Example ===\n");

    let statistics = Arc::new(PdxStatistics::new());
    let ctx = Arc::new(
        PdxContext::builder()
            .config(PdxConfig::builder().read_serialized(true).build()?)
            .statistics(statistics.clone())
            .build(),
    );
    ctx.classes().register_default::<Customer>();
    let serializer = PdxSerializer::new(Arc::clone(&ctx));

    let customer = Customer {
        id: 7,
        name: Some("Ada".to_string()),
        tiers: vec![1, 3],
    };
    let bytes = serializer.serialize(&customer)?;
    println!("Serialized {} bytes: {:02x?}", bytes.len(), &bytes[..]);

    let instance = serializer.deserialize(&bytes)?;
    println!("Instance: {}", instance);
    println!("  fields: {:?}", instance.field_names()?);
    println!("  name:   {:?}", instance.get_string("name")?);
    println!("  hash:   {}", instance.hashcode()?);

    let mut writer = instance.create_writer();
    writer.set_field("name", FieldValue::String(Some("Grace".to_string())))?;
    let renamed = writer.to_instance()?;
    println!("\nRenamed: {:?}", renamed.get_string("name")?);
    println!("  equal to original (same id): {}", renamed.equals(&instance)?);

    let mut factory = PdxInstanceFactory::new(&ctx, "example.Customer");
    factory.write_long("id", 8)?;
    let built = factory.create()?;
    println!("\nBuilt without a class: {}", built);
    let object = built.to_object()?;
    if let Some(customer) = object.as_any().downcast_ref::<Customer>() {
        println!("  materialized: {:?}", customer);
    }

    println!(
        "\nStatistics: {} serializations, {} materializations, {} instances created",
        statistics.serialization_count(),
        statistics.deserialization_count(),
        statistics.instance_creation_count()
    );
    Ok(())
}
