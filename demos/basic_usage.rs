//! Basic usage example for SchemaBit
//!
//! Run with: RUST_LOG=debug cargo run --example basic_usage

use schemabit::*;

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn order(seq: usize, symbol: &str, note: Option<&str>) -> Value {
    Value::object([
        ("seq", Value::from(seq as f64)),
        ("ts", Value::Date(1_700_000_000_000 + seq as i64)),
        ("price", Value::from(50.25)),
        ("qty", Value::from(100)),
        ("symbol", Value::from(symbol)),
        ("note", note.map(Value::from).unwrap_or(Value::Null)),
    ])
}

fn main() -> Result<()> {
    env_logger::init();

    println!("SchemaBit Basic Usage Example");
    println!("=============================");

    let codec = Codec::new();

    // Example 1: Inferred schema round trip
    println!("\n1. Simple Order:");
    {
        let value = order(12345, "AAPL", None);
        println!("  Inferred schema: {}", codec.infer_schema(&value)?);

        let bytes = codec.encode(&value, None)?;
        println!("  Encoded {} bytes: {}", bytes.len(), hex(&bytes));

        let decoded = codec.decode(&bytes)?;
        println!("  Decoded: {:?}", decoded);
        println!("  Equal: {}", decoded.deep_eq(&value));
    }

    // Example 2: Heterogeneous records are joined into one schema
    println!("\n2. Joined Schema:");
    {
        let value = Value::array([
            order(1, "AAPL", None),
            order(2, "MSFT", Some("Stop loss order")),
            Value::object([("seq", Value::from(3)), ("price", Value::from(49))]),
        ]);
        println!("  Inferred schema: {}", codec.infer_schema(&value)?);
        let bytes = codec.encode(&value, None)?;
        println!("  Encoded {} bytes", bytes.len());
    }

    // Example 3: Shared references and cycles
    println!("\n3. Shared References and Cycles:");
    {
        let parent = Value::object([("name", Value::from("parent"))]);
        let child = Value::object([("parent", parent.clone())]);
        if let Value::Object(o) = &parent {
            o.borrow_mut()
                .insert("children", Value::array([child.clone(), child]));
        }

        println!("  Inferred schema: {}", codec.infer_schema(&parent)?);
        let bytes = codec.encode(&parent, None)?;
        println!("  Encoded {} bytes: {}", bytes.len(), hex(&bytes));

        let decoded = codec.decode(&bytes)?;
        let first = decoded.get("children").at(0);
        println!(
            "  Child points back at parent: {}",
            first.get("parent").same_identity(&decoded)
        );

        // Break the cycles so both graphs can be freed
        for graph in [&parent, &decoded] {
            if let Value::Object(o) = graph {
                o.borrow_mut().remove("children");
            }
        }
    }

    // Example 4: Registered classes
    println!("\n4. Registered Classes:");
    {
        let point = Class::new("Point");
        codec.register(
            &point,
            Schema::object([("x", Schema::Number), ("y", Schema::Number)]),
            None,
        )?;

        let value = Value::array([
            point.construct([("x", Value::from(1.5)), ("y", Value::from(-2.0))]),
            point.construct([("x", Value::from(0.0)), ("y", Value::from(3.25))]),
        ]);
        println!("  Inferred schema: {}", codec.infer_schema(&value)?);

        let bytes = codec.encode(&value, None)?;
        let decoded = codec.decode(&bytes)?;
        println!("  Decoded: {:?}", decoded);
        println!("  First element kind: {}", decoded.at(0).kind_name());
    }

    // Example 5: Compiled codec
    println!("\n5. Compiled Codec:");
    {
        let schema = Schema::object([
            ("seq", Schema::PositiveInteger),
            ("ts", Schema::Date),
            ("price", Schema::Number),
            ("qty", Schema::Integer),
            ("symbol", Schema::String),
            ("note", Schema::nullable(Schema::String)),
        ]);
        let compiled = codec.compile(schema.clone())?;
        println!(
            "  Schema bytes ({}): {}",
            compiled.schema_bytes().len(),
            hex(compiled.schema_bytes())
        );

        let value = order(7, "TSLA", Some("Buy order"));
        let bytes = compiled.encode(&value)?;
        println!(
            "  Same bytes as generic path: {}",
            bytes == codec.encode(&value, Some(&schema))?
        );
        println!("  Naked payload: {} bytes", compiled.encode_naked(&value)?.len());
    }

    // Example 6: Low-level encoder and decoder
    println!("\n6. Manual Encoding with Low-level API:");
    {
        let mut enc = Encoder::new(Registry::new(), &Config::default());
        enc.put_string("greeting")?;
        enc.put_string("greeting")?;
        enc.put_integer(-300.0)?;
        enc.put_f64(0.1)?;
        enc.put_any(&Value::set([Value::from(true), Value::Null]))?;
        let bytes = enc.finish();
        println!("  Encoded {} bytes: {}", bytes.len(), hex(&bytes));

        let mut dec = Decoder::new(&bytes, Registry::new(), &Config::default());
        println!(
            "  Decoded: {:?} {:?} {} {} {:?}",
            dec.get_string()?,
            dec.get_string()?,
            dec.get_integer()?,
            dec.get_f64()?,
            dec.get_any()?
        );
        dec.finish()?;
    }

    // Example 7: Performance test
    println!("\n7. Performance Test:");
    {
        const N: usize = 10_000;
        let compiled = codec.compile(codec.infer_schema(&order(0, "AAPL", None))?)?;

        let start = std::time::Instant::now();
        for i in 0..N {
            let value = order(i, if i % 3 == 0 { "AAPL" } else { "MSFT" }, None);
            let bytes = compiled.encode(&value)?;
            let result = compiled.decode(&bytes)?;
            std::hint::black_box(result);
        }

        let elapsed = start.elapsed();
        let ns_per_op = elapsed.as_nanos() as u64 / N as u64;
        let ops_per_sec = N as f64 / elapsed.as_secs_f64();

        println!(
            "  {} roundtrips in {:.2}ms",
            N,
            elapsed.as_secs_f64() * 1000.0
        );
        println!("  {} ns/op, {:.0} ops/sec", ns_per_op, ops_per_sec);
    }

    println!("\nAll examples completed successfully!");
    Ok(())
}
