use criterion::{black_box, criterion_group, criterion_main, Criterion};
use molkit_chem::{
    canonical_smiles, classify, compute_descriptors, embed_molecule, minimize, parse_smiles,
    smiles_to_molecule, EmbedConfig, ForceField, MinimizeConfig,
};

/// A set of representative drug-like SMILES strings
const SMILES_SET: &[&str] = &[
    "CCO",                                  // ethanol
    "CC(=O)O",                              // acetic acid
    "c1ccccc1",                             // benzene
    "CC(=O)Oc1ccccc1C(=O)O",                // aspirin
    "CC12CCC3C(C1CCC2O)CCC4=CC(=O)CCC34C",  // testosterone
    "CN1C=NC2=C1C(=O)N(C(=O)N2C)C",         // caffeine
    "CC(C)CC1=CC=C(C=C1)C(C)C(=O)O",        // ibuprofen
    "CC(=O)NC1=CC=C(C=C1)O",                // acetaminophen
    "N[C@@H](C)C(=O)O",                     // alanine
    "c1ccc2ccccc2c1",                       // naphthalene
    "C1CCCCC1",                             // cyclohexane
    "c1ccncc1",                             // pyridine
];

fn bench_smiles_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("smiles_parse");

    let smiles_1k: Vec<&str> = SMILES_SET.iter().copied().cycle().take(1000).collect();

    group.bench_function("1k_mols", |b| {
        b.iter(|| {
            for &smi in black_box(&smiles_1k) {
                let _ = parse_smiles(smi);
            }
        })
    });

    group.finish();
}

fn bench_canonical(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonical");

    let mols: Vec<_> = SMILES_SET.iter().filter_map(|s| parse_smiles(s).ok()).collect();

    group.bench_function("smiles_set", |b| {
        b.iter(|| {
            for mol in black_box(&mols) {
                let _ = canonical_smiles(mol);
            }
        })
    });

    group.bench_function("descriptors", |b| {
        b.iter(|| {
            for mol in black_box(&mols) {
                let _ = compute_descriptors(mol);
            }
        })
    });

    let ranks: Vec<i64> = (0..10_000).map(|i| (i * 7919 % 500) as i64).collect();
    group.bench_function("classify_10k", |b| b.iter(|| classify(black_box(&ranks))));

    group.finish();
}

fn bench_geometry(c: &mut Criterion) {
    let mut group = c.benchmark_group("geometry");
    group.sample_size(10);

    let aspirin = smiles_to_molecule("CC(=O)Oc1ccccc1C(=O)O", Some("aspirin")).unwrap();
    let config = EmbedConfig::default();

    group.bench_function("embed_aspirin", |b| {
        b.iter(|| embed_molecule(black_box(&aspirin), &config))
    });

    let conformer = aspirin.conformer(0).unwrap().clone();
    for field in [ForceField::Uff, ForceField::Mmff94] {
        group.bench_function(format!("minimize_aspirin_{field}"), |b| {
            b.iter(|| minimize(&aspirin, black_box(&conformer), field, &MinimizeConfig::default()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_smiles_parse, bench_canonical, bench_geometry);
criterion_main!(benches);
