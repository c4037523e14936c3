//! Text rendering of emit instructions.

use crate::export::emit::{
    Instruction, LightBlock, ModelBlock, PrimitiveBlock, Target, TextureRef,
};
use crate::export::templates;
use crate::scene::{LightKind, Transform};
use std::fmt::Write;

/// Formats `value` the way JavaScript's `Number.prototype.toString` does.
pub fn js_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    // `{:e}` yields the shortest round-trip digits, e.g. "1.2345e3".
    let scientific = format!("{:e}", value.abs());
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let n = exponent + 1;

    let mut out = String::new();
    if value < 0.0 {
        out.push('-');
    }
    if k <= n && n <= 21 {
        out.push_str(&digits);
        out.extend(std::iter::repeat('0').take((n - k) as usize));
    } else if 0 < n && n <= 21 {
        out.push_str(&digits[..n as usize]);
        out.push('.');
        out.push_str(&digits[n as usize..]);
    } else if -6 < n && n <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat('0').take((-n) as usize));
        out.push_str(&digits);
    } else {
        out.push_str(&digits[..1]);
        if k > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        let e = n - 1;
        let _ = write!(out, "e{}{}", if e >= 0 { '+' } else { '-' }, e.abs());
    }
    out
}

fn vec3(values: [f64; 3]) -> String {
    format!(
        "{}, {}, {}",
        js_number(values[0]),
        js_number(values[1]),
        js_number(values[2])
    )
}

/// JavaScript's `a || b` for numbers: zero and NaN count as unset.
fn or_default(value: f64, fallback: f64) -> f64 {
    if value == 0.0 || value.is_nan() {
        fallback
    } else {
        value
    }
}

/// Escapes text for the inside of a single-quoted JS string.
pub fn js_string_body(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(ch),
        }
    }
    out
}

/// Keeps a `//` comment on one line.
fn comment_text(text: &str) -> String {
    text.replace(['\r', '\n', '\u{2028}', '\u{2029}'], " ")
}

/// Indentation aware line writer.
pub struct Formatter {
    target: Target,
    out: String,
    indent: usize,
}

impl Formatter {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            out: String::new(),
            indent: match target {
                Target::Preview => 0,
                Target::Standalone => 2,
            },
        }
    }

    pub fn render(mut self, instructions: &[Instruction]) -> String {
        for instruction in instructions {
            self.instruction(instruction);
        }
        self.out
    }

    fn line(&mut self, text: &str) {
        if text.is_empty() {
            self.out.push('\n');
            return;
        }
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn lines(&mut self, block: &str) {
        for text in block.lines() {
            self.line(text);
        }
    }

    fn nested(&mut self, body: impl FnOnce(&mut Self)) {
        self.indent += 1;
        body(self);
        self.indent -= 1;
    }

    fn instruction(&mut self, instruction: &Instruction) {
        match instruction {
            Instruction::Prelude => {
                self.lines(templates::SCENE_SETUP);
                if self.target == Target::Standalone {
                    self.line("renderer.shadowMap.type = THREE.PCFSoftShadowMap;");
                }
                self.line("document.body.appendChild(renderer.domElement);");
                self.line("");
            }
            Instruction::LoadTracking {
                textures,
                models,
            } => {
                self.line("const textureLoader = new THREE.TextureLoader();");
                self.line("");
                self.line(&format!("const texturesToLoad = {textures};"));
                self.line("let texturesLoaded = 0;");
                self.line(&format!("const modelsToLoad = {models};"));
                self.line("let modelsLoaded = 0;");
                self.line("");
                self.lines(templates::LOADING_PROGRESS);
                self.line("");
            }
            Instruction::Ground => {
                self.lines(templates::GROUND);
                self.line("");
            }
            Instruction::Comment(text) => self.line(&format!("// {}", comment_text(text))),
            Instruction::Light(light) => self.light(light),
            Instruction::DefaultLights => {
                self.line("// Default lights");
                self.line("const ambientLight = new THREE.AmbientLight(0x404040, 0.5);");
                self.line("scene.add(ambientLight);");
                self.line("const directionalLight = new THREE.DirectionalLight(0xffffff, 0.8);");
                self.line("directionalLight.position.set(10, 20, 5);");
                self.line("directionalLight.castShadow = true;");
                if self.target == Target::Standalone {
                    self.line("directionalLight.shadow.mapSize.width = 2048;");
                    self.line("directionalLight.shadow.mapSize.height = 2048;");
                }
                self.line("scene.add(directionalLight);");
                self.line("");
            }
            Instruction::Primitive(block) => self.primitive(block),
            Instruction::Model(block) => self.model(block),
            Instruction::ModelLoaders(models) => {
                self.line("// GLTF models");
                self.line("const loader = new THREE.GLTFLoader();");
                self.line("");
                for model in models {
                    self.model_loader(model);
                }
            }
            Instruction::InitialProgress => {
                self.line("// Initial loading progress update");
                self.line("updateLoadingProgress();");
                self.line("");
            }
            Instruction::Controls => self.lines(templates::CAMERA_CONTROLS),
        }
    }

    fn transform(&mut self, var: &str, transform: &Transform) {
        self.line(&format!("{var}.position.set({});", vec3(transform.position.to_array())));
        self.line(&format!("{var}.rotation.set({});", vec3(transform.rotation.to_array())));
        self.line(&format!("{var}.scale.set({});", vec3(transform.scale.to_array())));
    }

    fn light(&mut self, light: &LightBlock) {
        let (label, ctor, var) = match light.kind {
            LightKind::Ambient => (
                "Ambient Light",
                "AmbientLight",
                format!("ambientLight{}", light.index),
            ),
            LightKind::Directional => (
                "Directional Light",
                "DirectionalLight",
                format!("directionalLight{}", light.index),
            ),
            LightKind::Point => ("Point Light", "PointLight", format!("pointLight{}", light.index)),
        };
        let mut args = format!("0x{}, {}", light.color.hex(), js_number(light.intensity));
        if let Some(distance) = light.distance {
            let _ = write!(args, ", {}", js_number(distance));
        }
        self.line(&format!("// {label} {}", light.index));
        self.line(&format!("const {var} = new THREE.{ctor}({args});"));
        if light.kind != LightKind::Ambient {
            self.line(&format!("{var}.position.set({});", vec3(light.position.to_array())));
        }
        // Standalone games always shadow from directional and point lights.
        let standalone = self.target == Target::Standalone;
        if light.cast_shadow || (standalone && light.kind != LightKind::Ambient) {
            self.line(&format!("{var}.castShadow = true;"));
            if standalone && light.kind == LightKind::Directional {
                self.line(&format!("{var}.shadow.mapSize.width = 2048;"));
                self.line(&format!("{var}.shadow.mapSize.height = 2048;"));
            }
        }
        self.line(&format!("scene.add({var});"));
        self.line("");
    }

    fn primitive(&mut self, block: &PrimitiveBlock) {
        let i = block.index;
        self.line(&format!("// {} {i}", block.label));
        self.line(&format!("const geometry{i} = new THREE.{};", block.geometry));
        self.line(&format!("const material{i} = new THREE.MeshStandardMaterial({{"));
        let double_sided = block.double_sided;
        self.nested(|f| {
            f.line(&format!("color: 0x{},", block.color.hex()));
            f.line(&format!("roughness: {},", js_number(or_default(block.roughness, 0.7))));
            let metalness = format!("metalness: {}", js_number(or_default(block.metalness, 0.2)));
            if double_sided {
                f.line(&format!("{metalness},"));
                f.line("side: THREE.DoubleSide");
            } else {
                f.line(&metalness);
            }
        });
        self.line("});");
        if let Some(texture) = &block.diffuse {
            self.texture(i, "map", "texture", texture);
        }
        if let Some(texture) = &block.normal_map {
            self.texture(i, "normalMap", "normal map", texture);
        }
        self.line(&format!("const mesh{i} = new THREE.Mesh(geometry{i}, material{i});"));
        self.transform(&format!("mesh{i}"), &block.transform);
        self.line(&format!("mesh{i}.castShadow = true;"));
        self.line(&format!("mesh{i}.receiveShadow = true;"));
        self.line(&format!("scene.add(mesh{i});"));
        self.line("");
    }

    fn texture(&mut self, i: usize, property: &str, what: &str, texture: &TextureRef) {
        let target = format!("material{i}.{property}");
        let path = format!("textures/{}", js_string_body(&texture.file_name));
        match self.target {
            Target::Preview => {
                self.line(&format!("{target} = new THREE.TextureLoader().load('{path}');"));
            }
            Target::Standalone => {
                self.line(&format!("{target} = textureLoader.load('{path}',"));
                self.nested(|f| {
                    f.line("function () {");
                    f.nested(|f| {
                        f.line(&format!("material{i}.needsUpdate = true;"));
                        f.line("texturesLoaded++;");
                        f.line("updateLoadingProgress();");
                    });
                    f.line("},");
                    f.line("undefined,");
                    f.line("function (error) {");
                    f.nested(|f| {
                        f.line(&format!(
                            "console.error('Error loading {what} {}:', error);",
                            js_string_body(&texture.file_name)
                        ));
                        f.line("texturesLoaded++;");
                        f.line("updateLoadingProgress();");
                    });
                    f.line("}");
                });
                self.line(");");
            }
        }
        self.line(&format!("{target}.wrapS = THREE.RepeatWrapping;"));
        self.line(&format!("{target}.wrapT = THREE.RepeatWrapping;"));
        if let Some([u, v]) = texture.repeat {
            self.line(&format!("{target}.repeat.set({}, {});", js_number(u), js_number(v)));
        }
    }

    fn model(&mut self, block: &ModelBlock) {
        let i = block.index;
        match self.target {
            Target::Preview => {
                let var = format!("model{i}");
                self.line(&format!("// Imported model: {}", comment_text(&block.file_name)));
                self.line(&format!("const {var} = new THREE.Object3D();"));
                self.transform(&var, &block.transform);
                self.line(
                    "// To load the model, include GLTFLoader.js and replace the placeholder:",
                );
                self.line("// const loader = new THREE.GLTFLoader();");
                let path = js_string_body(&block.file_name);
                self.line(&format!("// loader.load('{}', (gltf) => {{", comment_text(&path)));
                self.line(&format!("//     gltf.scene.position.copy({var}.position);"));
                self.line(&format!("//     gltf.scene.rotation.copy({var}.rotation);"));
                self.line(&format!("//     gltf.scene.scale.copy({var}.scale);"));
                self.line("//     scene.add(gltf.scene);");
                self.line("// });");
                self.line(&format!("scene.add({var});"));
            }
            Target::Standalone => {
                let var = format!("modelPlaceholder{i}");
                self.line(&format!("// GLTF model: {}", comment_text(&block.file_name)));
                self.line(&format!("const {var} = new THREE.Object3D();"));
                self.transform(&var, &block.transform);
                self.line(&format!("scene.add({var});"));
            }
        }
        self.line("");
    }

    fn model_loader(&mut self, block: &ModelBlock) {
        let i = block.index;
        let name = js_string_body(&block.file_name);
        self.line(&format!("loader.load('models/{name}',"));
        self.nested(|f| {
            f.line("function (gltf) {");
            f.nested(|f| {
                f.line(&format!("gltf.scene.position.copy(modelPlaceholder{i}.position);"));
                f.line(&format!("gltf.scene.rotation.copy(modelPlaceholder{i}.rotation);"));
                f.line(&format!("gltf.scene.scale.copy(modelPlaceholder{i}.scale);"));
                f.line("gltf.scene.traverse(function (child) {");
                f.nested(|f| {
                    f.line("if (child.isMesh) {");
                    f.nested(|f| {
                        f.line("child.castShadow = true;");
                        f.line("child.receiveShadow = true;");
                    });
                    f.line("}");
                });
                f.line("});");
                f.line(&format!("scene.remove(modelPlaceholder{i});"));
                f.line("scene.add(gltf.scene);");
                f.line("modelsLoaded++;");
                f.line("updateLoadingProgress();");
            });
            f.line("},");
            f.line("undefined,");
            f.line("function (error) {");
            f.nested(|f| {
                f.line(&format!("console.error('Error loading model {name}:', error);"));
                f.line("modelsLoaded++;");
                f.line("updateLoadingProgress();");
            });
            f.line("}");
        });
        self.line(");");
        self.line("");
    }
}
