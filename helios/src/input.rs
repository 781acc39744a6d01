//! Parser-neutral input object model: five kinds of definition objects, keyed by a `kind` string,
//! deserialised with `serde_json`. The ACE reader and the full distribution catalogue are out of
//! scope; material objects here are restricted to the macroscopic ("macro-xs") form, which is
//! enough to build a complete geometry + material catalogue end to end.

use std::collections::HashMap;

use helios_core::driver::settings::{ConcurrencyPolicy, CriticalitySettings, Settings};
use helios_core::driver::source::PointIsotropicSource;
use helios_core::error::{GeometryError, MaterialError, SetupError};
use helios_core::geometry::cell::{Fill, Token};
use helios_core::geometry::{Boundary, Cell, Geometry, Lattice, LatticeKind, Surface, SurfaceKind, Universe};
use helios_core::material::isotope::ReactionKind;
use helios_core::material::{Composition, Isotope, Material, Medium};
use helios_core::numeric_types::Index;
use serde::Deserialize;
use smallvec::SmallVec;

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InputObject {
    Surface(SurfaceDef),
    Cell(CellDef),
    Lattice(LatticeDef),
    Material(MaterialDef),
    Setting(SettingDef),
    SourceSampler(SourceDef),
}

#[derive(Debug, Deserialize)]
pub struct SurfaceDef {
    pub id: i64,
    #[serde(rename = "type")]
    pub surface_type: String,
    pub coeffs: Vec<f64>,
    #[serde(default)]
    pub boundary: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CellDef {
    pub id: i64,
    /// Postfix Boolean string over signed surface ids, e.g. `"1 -2 and"`.
    pub surfaces: String,
    #[serde(default)]
    pub universe: Option<i64>,
    /// Fills with a nested universe when set (mutually exclusive with `material`/`lattice`).
    #[serde(default)]
    pub fill: Option<i64>,
    /// `"void"` or a material id, as a string so the object model stays homogeneous.
    #[serde(default)]
    pub material: Option<String>,
    /// Fills with a lattice when set (mutually exclusive with `fill`/`material`).
    #[serde(default)]
    pub lattice: Option<i64>,
    #[serde(default)]
    pub translation: Option<[f64; 3]>,
    #[serde(default)]
    pub cell_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LatticeDef {
    pub id: i64,
    #[serde(rename = "type")]
    pub lattice_type: String,
    pub dimension: [i32; 3],
    pub pitch: [f64; 3],
    pub universes: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct MaterialDef {
    pub id: i64,
    pub sigma_a: f64,
    pub sigma_f: f64,
    pub nu_sigma_f: f64,
}

#[derive(Debug, Deserialize)]
pub struct SettingDef {
    pub name: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct SourceDef {
    pub position: [f64; 3],
    #[serde(default = "default_source_energy")]
    pub energy: f64,
}

fn default_source_energy() -> f64 {
    2.0e6
}

/// Builds the surface type from `(type, coeffs)`.
fn surface_kind(surface_type: &str, coeffs: &[f64]) -> Result<SurfaceKind, GeometryError> {
    let unsupported = || GeometryError::UnsupportedSurfaceType(surface_type.to_string());
    Ok(match surface_type {
        "plane-x" => SurfaceKind::PlaneX { x0: coeffs[0] },
        "plane-y" => SurfaceKind::PlaneY { y0: coeffs[0] },
        "plane-z" => SurfaceKind::PlaneZ { z0: coeffs[0] },
        "plane" => SurfaceKind::Plane {
            normal: [coeffs[0], coeffs[1], coeffs[2]],
            d: coeffs[3],
        },
        "sphere" => SurfaceKind::Sphere {
            center: [coeffs[0], coeffs[1], coeffs[2]],
            radius: coeffs[3],
        },
        "cyl-x" => SurfaceKind::CylX {
            y0: coeffs[0],
            z0: coeffs[1],
            radius: coeffs[2],
        },
        "cyl-y" => SurfaceKind::CylY {
            x0: coeffs[0],
            z0: coeffs[1],
            radius: coeffs[2],
        },
        "cyl-z" => SurfaceKind::CylZ {
            x0: coeffs[0],
            y0: coeffs[1],
            radius: coeffs[2],
        },
        "cone-x" => SurfaceKind::ConeX {
            x0: coeffs[0],
            y0: coeffs[1],
            z0: coeffs[2],
            tan2: coeffs[3],
        },
        "cone-y" => SurfaceKind::ConeY {
            x0: coeffs[0],
            y0: coeffs[1],
            z0: coeffs[2],
            tan2: coeffs[3],
        },
        "cone-z" => SurfaceKind::ConeZ {
            x0: coeffs[0],
            y0: coeffs[1],
            z0: coeffs[2],
            tan2: coeffs[3],
        },
        "quadric" => SurfaceKind::Quadric {
            a: coeffs[0],
            b: coeffs[1],
            c: coeffs[2],
            d: coeffs[3],
            e: coeffs[4],
            f: coeffs[5],
            g: coeffs[6],
            h: coeffs[7],
            j: coeffs[8],
            k: coeffs[9],
        },
        _ => return Err(unsupported()),
    })
}

fn boundary_kind(name: Option<&str>) -> Boundary {
    match name {
        Some("reflective") => Boundary::Reflect,
        Some("vacuum") => Boundary::Vacuum,
        _ => Boundary::Transmit,
    }
}

/// Lowers a postfix Boolean string (`"1 -2 and"`) into expression tokens plus the deduplicated
/// surface list used by [`Cell::distance_to_boundary`].
fn lower_expression(
    cell_id: i64,
    text: &str,
    surface_ids: &HashMap<i64, Index>,
) -> Result<(SmallVec<[Token; 16]>, SmallVec<[Index; 8]>), GeometryError> {
    let mut expr = SmallVec::new();
    let mut literals = SmallVec::new();
    for word in text.split_whitespace() {
        match word {
            "and" => expr.push(Token::And),
            "or" => expr.push(Token::Or),
            "not" => expr.push(Token::Not),
            signed => {
                let id: i64 = signed
                    .parse()
                    .map_err(|_| GeometryError::BadExpression(cell_id, text.to_string()))?;
                let sense = id >= 0;
                let surface_id = id.abs();
                let &surface = surface_ids
                    .get(&surface_id)
                    .ok_or(GeometryError::UnknownSurface(surface_id))?;
                if !literals.contains(&surface) {
                    literals.push(surface);
                }
                expr.push(Token::Literal { surface, sense });
            }
        }
    }
    Ok((expr, literals))
}

/// Built result of [`build`]: the geometry/material catalogues, resolved settings, and the source
/// samplers declared by `source-sampler` objects.
pub struct BuiltInput {
    pub geometry: Geometry,
    pub medium: Medium,
    pub settings: Settings,
    pub sources: Vec<PointIsotropicSource>,
}

/// Builds a complete [`Geometry`], [`Medium`], [`Settings`] and source list from a flat list of
/// input objects.
pub fn build(objects: Vec<InputObject>) -> Result<BuiltInput, SetupError> {
    let mut surface_defs = Vec::new();
    let mut cell_defs = Vec::new();
    let mut lattice_defs = Vec::new();
    let mut material_defs = Vec::new();
    let mut setting_defs = Vec::new();
    let mut source_defs = Vec::new();

    for obj in objects {
        match obj {
            InputObject::Surface(s) => surface_defs.push(s),
            InputObject::Cell(c) => cell_defs.push(c),
            InputObject::Lattice(l) => lattice_defs.push(l),
            InputObject::Material(m) => material_defs.push(m),
            InputObject::Setting(s) => setting_defs.push(s),
            InputObject::SourceSampler(s) => source_defs.push(s),
        }
    }

    let mut surface_ids = HashMap::new();
    let mut surfaces = Vec::new();
    for (idx, def) in surface_defs.iter().enumerate() {
        if surface_ids.insert(def.id, idx as Index).is_some() {
            return Err(GeometryError::DuplicateSurfaceId(def.id).into());
        }
        let kind = surface_kind(&def.surface_type, &def.coeffs)?;
        let boundary = boundary_kind(def.boundary.as_deref());
        surfaces.push(Surface::new(def.id, idx as Index, kind, boundary));
    }

    let mut material_ids = HashMap::new();
    let mut isotopes = Vec::new();
    let mut materials = Vec::new();
    for (idx, def) in material_defs.iter().enumerate() {
        if material_ids.insert(def.id, idx as Index).is_some() {
            return Err(MaterialError::DuplicateMaterialId(def.id).into());
        }
        // A macroscopic ("group") material is its own one-reaction-channel isotope, flat over a
        // two-point energy grid: the "material (macro-xs)" kind gives Σ_a/Σ_f/νΣ_f only, with no
        // elastic channel, so collisions here are always absorption or fission.
        let grid = vec![1e-11, 20.0];
        let iso = Isotope::new(
            format!("material-{}", def.id),
            1.0,
            grid.clone(),
            vec![ReactionKind::Capture, ReactionKind::Fission],
            vec![
                vec![def.sigma_a - def.sigma_f; grid.len()],
                vec![def.sigma_f; grid.len()],
            ],
            if def.nu_sigma_f > 0.0 && def.sigma_f > 0.0 {
                vec![def.nu_sigma_f / def.sigma_f; grid.len()]
            } else {
                vec![]
            },
            vec![0.0, 1.0],
            vec![0.0, 1.0],
        );
        let iso_idx = idx as Index;
        isotopes.push(iso);
        materials.push(Material::new(
            def.id,
            idx as Index,
            1.0,
            vec![Composition {
                isotope: iso_idx,
                atom_density: 1.0,
            }],
            &isotopes,
        ));
    }
    let medium = Medium::new(isotopes, materials);

    // Every universe id this input touches, either as a cell's owning universe or as a fill
    // target (cell or lattice), gets one arena slot; user id 0 is always the root.
    let mut universe_ids: HashMap<i64, Index> = HashMap::new();
    universe_ids.insert(0, 0);
    for def in &cell_defs {
        let uid = def.universe.unwrap_or(0);
        if !universe_ids.contains_key(&uid) {
            let idx = universe_ids.len() as Index;
            universe_ids.insert(uid, idx);
        }
        if let Some(fill_id) = def.fill {
            if !universe_ids.contains_key(&fill_id) {
                let idx = universe_ids.len() as Index;
                universe_ids.insert(fill_id, idx);
            }
        }
    }
    for def in &lattice_defs {
        for &uid in &def.universes {
            if !universe_ids.contains_key(&uid) {
                let idx = universe_ids.len() as Index;
                universe_ids.insert(uid, idx);
            }
        }
    }

    let mut universes: Vec<Universe> = (0..universe_ids.len())
        .map(|i| Universe {
            user_id: 0,
            index: i as Index,
            cells: SmallVec::new(),
        })
        .collect();
    for (&uid, &idx) in &universe_ids {
        universes[idx as usize].user_id = uid;
    }

    let mut lattice_ids: HashMap<i64, Index> = HashMap::new();
    for (idx, def) in lattice_defs.iter().enumerate() {
        lattice_ids.insert(def.id, idx as Index);
    }

    let mut cells = Vec::new();
    for (idx, def) in cell_defs.iter().enumerate() {
        let (expr, literal_surfaces) = lower_expression(def.id, &def.surfaces, &surface_ids)?;
        let universe = *universe_ids.get(&def.universe.unwrap_or(0)).unwrap();
        let fill = if def.cell_type.as_deref() == Some("dead") {
            Fill::Void
        } else if let Some(mat_id) = &def.material {
            if mat_id == "void" {
                Fill::Void
            } else {
                let parsed: i64 = mat_id
                    .parse()
                    .map_err(|_| MaterialError::Unknown(def.id, mat_id.clone()))?;
                Fill::Material(medium.lookup(parsed)?)
            }
        } else if let Some(lattice_id) = def.lattice {
            let &lat_idx = lattice_ids
                .get(&lattice_id)
                .ok_or(GeometryError::UnknownLattice(lattice_id))?;
            Fill::Lattice(lat_idx)
        } else if let Some(fill_id) = def.fill {
            Fill::Universe(*universe_ids.get(&fill_id).unwrap())
        } else {
            Fill::Void
        };
        cells.push(Cell {
            user_id: def.id,
            index: idx as Index,
            expr,
            literal_surfaces,
            fill,
            universe,
            translation: def.translation.unwrap_or([0.0, 0.0, 0.0]),
            dead: def.cell_type.as_deref() == Some("dead"),
        });
        universes[universe as usize].cells.push(idx as Index);
    }

    let lattices: Vec<Lattice> = lattice_defs
        .iter()
        .enumerate()
        .map(|(idx, def)| Lattice {
            user_id: def.id,
            index: idx as Index,
            kind: if def.lattice_type == "hex" {
                LatticeKind::Hex
            } else {
                LatticeKind::Rect
            },
            dimension: def.dimension,
            pitch: def.pitch,
            origin: [
                -def.pitch[0] * def.dimension[0] as f64 / 2.0,
                -def.pitch[1] * def.dimension[1] as f64 / 2.0,
                -def.pitch[2] * def.dimension[2] as f64 / 2.0,
            ],
            universes: def
                .universes
                .iter()
                .map(|uid| *universe_ids.get(uid).unwrap_or(&0))
                .collect(),
        })
        .collect();

    let geometry = Geometry::new(surfaces, cells, universes, lattices, 0);
    geometry.validate_acyclic()?;

    let mut settings = Settings::default();
    for def in &setting_defs {
        apply_setting(&mut settings, def)?;
    }

    let sources = source_defs
        .into_iter()
        .map(|def| PointIsotropicSource {
            position: def.position,
            energy: def.energy,
        })
        .collect();

    Ok(BuiltInput {
        geometry,
        medium,
        settings,
        sources,
    })
}

fn apply_setting(settings: &mut Settings, def: &SettingDef) -> Result<(), SetupError> {
    use helios_core::driver::settings::SettingValue;
    let Some(value) = &def.value else {
        return Ok(());
    };
    match def.name.as_str() {
        "seed" => settings.seed = value.as_u64().unwrap_or(settings.seed),
        "max_rng_per_history" => {
            settings.max_rng_per_history = value.as_u64().unwrap_or(settings.max_rng_per_history)
        }
        "max_source_samples" => {
            settings.max_source_samples = value.as_u64().unwrap_or(settings.max_source_samples)
        }
        "multithread" => {
            let policy = match value.as_str() {
                Some("single") => ConcurrencyPolicy::Single,
                Some("threadpool") => ConcurrencyPolicy::Threadpool,
                _ => ConcurrencyPolicy::Tasks,
            };
            settings.apply("multithread", SettingValue::Policy(policy))?;
        }
        "criticality" => {
            let batches = value.get("batches").and_then(|v| v.as_u64()).unwrap_or(100) as u32;
            let inactive = value.get("inactive").and_then(|v| v.as_u64()).unwrap_or(10) as u32;
            let particles = value.get("particles").and_then(|v| v.as_u64()).unwrap_or(10_000);
            settings.criticality = CriticalitySettings {
                batches,
                inactive,
                particles,
            };
        }
        _ => {}
    }
    Ok(())
}
