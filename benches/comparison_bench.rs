//! Comparison benchmarks between SchemaBit and other serialization libraries
//!
//! The payload is a product catalog: nested records, tag lists drawn from a
//! small pool, and a handful of category records shared by every product.
//! The serde formats write each shared category out in full; SchemaBit writes
//! it once and back-references it, and dedups the repeated tag strings.
//!
//! Run with: cargo bench comparison_bench

use std::collections::HashMap;

use borsh::{BorshDeserialize, BorshSerialize};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use schemabit::{Codec, CompiledCodec, Value};
use serde::{Deserialize, Serialize};

const TAGS: [&str; 6] = ["sale", "new", "eco", "bundle", "limited", "refurbished"];
const SIZES: [usize; 3] = [1, 10, 100];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
struct Category {
    id: u32,
    name: String,
    path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
struct Product {
    sku: String,
    title: String,
    price_cents: i64,
    stock: u32,
    tags: Vec<String>,
    category: Category,
    discontinued: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
struct Catalog {
    region: String,
    generated_ms: i64,
    products: Vec<Product>,
}

fn categories() -> Vec<Category> {
    [("Laptops", "computers"), ("Phones", "mobile"), ("Cables", "accessories"), ("Chargers", "accessories")]
        .iter()
        .enumerate()
        .map(|(i, (name, parent))| Category {
            id: 100 + i as u32,
            name: name.to_string(),
            path: vec!["electronics".to_string(), parent.to_string()],
        })
        .collect()
}

fn catalog(products: usize) -> Catalog {
    let categories = categories();
    Catalog {
        region: "eu-west".to_string(),
        generated_ms: 1_700_000_000_000,
        products: (0..products)
            .map(|i| Product {
                sku: format!("SKU-{:05}", i),
                title: format!("Product number {}", i),
                price_cents: 999 + (i as i64 * 137) % 50_000,
                stock: (i as u32 * 7) % 300,
                tags: (0..i % 3 + 1).map(|t| TAGS[(i + t) % TAGS.len()].to_string()).collect(),
                category: categories[i % categories.len()].clone(),
                discontinued: (i % 5 == 4).then(|| "superseded".to_string()),
            })
            .collect(),
    }
}

fn strings(items: &[String]) -> Value {
    Value::array(items.iter().map(|s| Value::from(s.as_str())))
}

/// Value graph for `catalog`, with one shared object per category
fn catalog_value(catalog: &Catalog) -> Value {
    let mut shared: HashMap<u32, Value> = HashMap::new();
    let products = catalog.products.iter().map(|p| {
        let category = shared
            .entry(p.category.id)
            .or_insert_with(|| {
                Value::object([
                    ("id", Value::from(p.category.id as f64)),
                    ("name", Value::from(p.category.name.as_str())),
                    ("path", strings(&p.category.path)),
                ])
            })
            .clone();
        Value::object([
            ("sku", Value::from(p.sku.as_str())),
            ("title", Value::from(p.title.as_str())),
            ("price_cents", Value::from(p.price_cents as f64)),
            ("stock", Value::from(p.stock as f64)),
            ("tags", strings(&p.tags)),
            ("category", category),
            (
                "discontinued",
                p.discontinued.as_deref().map(Value::from).unwrap_or(Value::Null),
            ),
        ])
    });
    let products = Value::array(products.collect::<Vec<_>>());
    Value::object([
        ("region", Value::from(catalog.region.as_str())),
        ("generated_ms", Value::Date(catalog.generated_ms)),
        ("products", products),
    ])
}

fn text(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_owned()
}

fn text_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(array) => array.borrow().items.iter().map(text).collect(),
        _ => Vec::new(),
    }
}

fn number(value: &Value) -> f64 {
    value.as_f64().unwrap_or_default()
}

fn catalog_from_value(value: &Value) -> Catalog {
    let products = match value.get("products") {
        Value::Array(array) => array
            .borrow()
            .items
            .iter()
            .map(|p| {
                let category = p.get("category");
                Product {
                    sku: text(&p.get("sku")),
                    title: text(&p.get("title")),
                    price_cents: number(&p.get("price_cents")) as i64,
                    stock: number(&p.get("stock")) as u32,
                    tags: text_list(&p.get("tags")),
                    category: Category {
                        id: number(&category.get("id")) as u32,
                        name: text(&category.get("name")),
                        path: text_list(&category.get("path")),
                    },
                    discontinued: p.get("discontinued").as_str().map(str::to_owned),
                }
            })
            .collect(),
        _ => Vec::new(),
    };
    let generated_ms = match value.get("generated_ms") {
        Value::Date(ms) => ms,
        _ => 0,
    };
    Catalog {
        region: text(&value.get("region")),
        generated_ms,
        products,
    }
}

/// Codec compiled for the catalog shape, inferred from a sample that covers
/// both arms of `discontinued`
fn compiled_codec() -> CompiledCodec {
    let codec = Codec::new();
    let schema = codec.infer_schema(&catalog_value(&catalog(10))).unwrap();
    codec.compile(schema).unwrap()
}

fn bench_encoding_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalog_encode");
    let codec = Codec::new();
    let compiled = compiled_codec();

    for size in SIZES {
        let data = catalog(size);
        let value = catalog_value(&data);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("schemabit", size), &data, |b, data| {
            b.iter(|| black_box(compiled.encode(&catalog_value(black_box(data))).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("schemabit_graph_only", size), &value, |b, value| {
            b.iter(|| black_box(compiled.encode(black_box(value)).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("schemabit_inferred", size), &value, |b, value| {
            b.iter(|| black_box(codec.encode(black_box(value), None).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("bincode", size), &data, |b, data| {
            b.iter(|| black_box(bincode::serialize(black_box(data)).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("messagepack", size), &data, |b, data| {
            b.iter(|| black_box(rmp_serde::to_vec(black_box(data)).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("postcard", size), &data, |b, data| {
            b.iter(|| black_box(postcard::to_allocvec(black_box(data)).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("borsh", size), &data, |b, data| {
            b.iter(|| black_box(borsh::to_vec(black_box(data)).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("json", size), &data, |b, data| {
            b.iter(|| black_box(serde_json::to_vec(black_box(data)).unwrap()));
        });
    }

    group.finish();
}

fn bench_decoding_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalog_decode");
    let compiled = compiled_codec();

    for size in SIZES {
        let data = catalog(size);
        group.throughput(Throughput::Elements(size as u64));

        let schemabit_data = compiled.encode(&catalog_value(&data)).unwrap();
        group.bench_with_input(BenchmarkId::new("schemabit", size), &schemabit_data, |b, bytes| {
            b.iter(|| black_box(catalog_from_value(&compiled.decode(black_box(bytes)).unwrap())));
        });
        group.bench_with_input(
            BenchmarkId::new("schemabit_graph_only", size),
            &schemabit_data,
            |b, bytes| {
                b.iter(|| black_box(compiled.decode(black_box(bytes)).unwrap()));
            },
        );

        let bincode_data = bincode::serialize(&data).unwrap();
        group.bench_with_input(BenchmarkId::new("bincode", size), &bincode_data, |b, bytes| {
            b.iter(|| black_box(bincode::deserialize::<Catalog>(black_box(bytes)).unwrap()));
        });

        let messagepack_data = rmp_serde::to_vec(&data).unwrap();
        group.bench_with_input(BenchmarkId::new("messagepack", size), &messagepack_data, |b, bytes| {
            b.iter(|| black_box(rmp_serde::from_slice::<Catalog>(black_box(bytes)).unwrap()));
        });

        let postcard_data = postcard::to_allocvec(&data).unwrap();
        group.bench_with_input(BenchmarkId::new("postcard", size), &postcard_data, |b, bytes| {
            b.iter(|| black_box(postcard::from_bytes::<Catalog>(black_box(bytes)).unwrap()));
        });

        let borsh_data = borsh::to_vec(&data).unwrap();
        group.bench_with_input(BenchmarkId::new("borsh", size), &borsh_data, |b, bytes| {
            b.iter(|| black_box(Catalog::try_from_slice(black_box(bytes)).unwrap()));
        });

        let json_data = serde_json::to_vec(&data).unwrap();
        group.bench_with_input(BenchmarkId::new("json", size), &json_data, |b, bytes| {
            b.iter(|| black_box(serde_json::from_slice::<Catalog>(black_box(bytes)).unwrap()));
        });
    }

    group.finish();
}

fn bench_shared_graph(c: &mut Criterion) {
    // Every product points at one category, and the category lists its
    // products; only SchemaBit can carry the cycle
    let mut group = c.benchmark_group("catalog_cycle");
    let codec = Codec::new();

    for size in SIZES {
        let value = catalog_value(&catalog(size));
        let products = value.get("products");
        let category = products.at(0).get("category");
        if let Value::Object(o) = &category {
            o.borrow_mut().insert("products", products.clone());
        }
        let bytes = codec.encode(&value, None).unwrap();

        group.bench_with_input(BenchmarkId::new("encode", size), &value, |b, value| {
            b.iter(|| black_box(codec.encode(black_box(value), None).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &bytes, |b, bytes| {
            b.iter(|| black_box(codec.decode(black_box(bytes)).unwrap()));
        });

        if let Value::Object(o) = &category {
            o.borrow_mut().remove("products");
        }
    }

    group.finish();
}

fn bench_size_comparison(c: &mut Criterion) {
    let compiled = compiled_codec();

    println!("\n=== SERIALIZED SIZE COMPARISON ===");

    for size in SIZES {
        let data = catalog(size);
        let value = catalog_value(&data);
        assert_eq!(catalog_from_value(&compiled.decode(&compiled.encode(&value).unwrap()).unwrap()), data);

        println!("\ncatalog of {} products:", size);
        println!(
            "  SchemaBit:   {} bytes (schema {}, data {})",
            compiled.encode(&value).unwrap().len(),
            compiled.schema_bytes().len(),
            compiled.encode_naked(&value).unwrap().len()
        );
        println!("  Bincode:     {} bytes", bincode::serialize(&data).unwrap().len());
        println!("  MessagePack: {} bytes", rmp_serde::to_vec(&data).unwrap().len());
        println!("  Postcard:    {} bytes", postcard::to_allocvec(&data).unwrap().len());
        println!("  Borsh:       {} bytes", borsh::to_vec(&data).unwrap().len());
        println!("  JSON:        {} bytes", serde_json::to_vec(&data).unwrap().len());
    }

    c.bench_function("catalog_value_build_100", |b| {
        let data = catalog(100);
        b.iter(|| black_box(catalog_value(black_box(&data))));
    });
}

criterion_group!(
    benches,
    bench_encoding_comparison,
    bench_decoding_comparison,
    bench_shared_graph,
    bench_size_comparison
);
criterion_main!(benches);
