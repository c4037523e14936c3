//! Fixed text blocks shared by the preview code and the standalone game.

pub const SCENE_SETUP: &str = "\
const scene = new THREE.Scene();
scene.background = new THREE.Color(0x1a1a1a);

const camera = new THREE.PerspectiveCamera(75, window.innerWidth / window.innerHeight, 0.1, 1000);
camera.position.set(0, 1, 5);

const renderer = new THREE.WebGLRenderer({ antialias: true });
renderer.setSize(window.innerWidth, window.innerHeight);
renderer.shadowMap.enabled = true;";

pub const GROUND: &str = "\
// Ground
const groundGeometry = new THREE.PlaneGeometry(100, 100);
const groundMaterial = new THREE.MeshStandardMaterial({ color: 0x3a3a3a, side: THREE.DoubleSide });
const ground = new THREE.Mesh(groundGeometry, groundMaterial);
ground.rotation.x = -Math.PI / 2;
ground.position.y = -2;
ground.receiveShadow = true;
scene.add(ground);";

pub const LOADING_PROGRESS: &str = "\
function updateLoadingProgress() {
    const loadingDiv = document.getElementById('loading');
    const totalItems = texturesToLoad + modelsToLoad;
    const loadedItems = texturesLoaded + modelsLoaded;

    if (totalItems === 0) {
        loadingDiv.style.display = 'none';
        return;
    }

    const percent = Math.round((loadedItems / totalItems) * 100);
    loadingDiv.textContent = `Loading... ${percent}% (${loadedItems}/${totalItems})`;

    if (loadedItems >= totalItems) {
        setTimeout(() => {
            loadingDiv.style.display = 'none';
        }, 500);
    }
}";

/// First person controls: WASD/arrows, space to jump, drag to look.
pub const CAMERA_CONTROLS: &str = "\
// Camera controls (WASD movement, mouse look)
let moveForward = false;
let moveBackward = false;
let moveLeft = false;
let moveRight = false;
let canJump = false;

const velocity = new THREE.Vector3();

let prevTime = performance.now();
let isDragging = false;
let previousMousePosition = { x: 0, y: 0 };

const rotationSmoothness = 0.15;
let targetPitch = 0;
let targetYaw = 0;
let currentPitch = 0;
let currentYaw = 0;

function setMovement(code, pressed) {
    switch (code) {
        case 'ArrowUp':
        case 'KeyW':
            moveForward = pressed;
            break;
        case 'ArrowLeft':
        case 'KeyA':
            moveLeft = pressed;
            break;
        case 'ArrowDown':
        case 'KeyS':
            moveBackward = pressed;
            break;
        case 'ArrowRight':
        case 'KeyD':
            moveRight = pressed;
            break;
    }
}

function onKeyDown(event) {
    setMovement(event.code, true);
    if (event.code === 'Space' && canJump) {
        velocity.y += 90.5;
        canJump = false;
    }
}

function onKeyUp(event) {
    setMovement(event.code, false);
}

function onMouseDown(event) {
    isDragging = true;
    previousMousePosition = { x: event.clientX, y: event.clientY };
}

function onMouseMove(event) {
    if (!isDragging) return;
    targetYaw -= (event.clientX - previousMousePosition.x) * 0.002;
    targetPitch -= (event.clientY - previousMousePosition.y) * 0.002;
    targetPitch = Math.max(-Math.PI / 2, Math.min(Math.PI / 2, targetPitch));
    previousMousePosition = { x: event.clientX, y: event.clientY };
}

function onMouseUp() {
    isDragging = false;
}

document.addEventListener('keydown', onKeyDown);
document.addEventListener('keyup', onKeyUp);
document.addEventListener('mousedown', onMouseDown);
document.addEventListener('mousemove', onMouseMove);
document.addEventListener('mouseup', onMouseUp);

function animate() {
    requestAnimationFrame(animate);

    const time = performance.now();
    const delta = (time - prevTime) / 1000;

    velocity.x -= velocity.x * 12.0 * delta;
    velocity.z -= velocity.z * 12.0 * delta;
    velocity.y -= 9.8 * 27.0 * delta;

    currentYaw += (targetYaw - currentYaw) * rotationSmoothness;
    currentPitch += (targetPitch - currentPitch) * rotationSmoothness;
    camera.rotation.order = 'YXZ';
    camera.rotation.y = currentYaw;
    camera.rotation.x = currentPitch;

    const forward = new THREE.Vector3();
    camera.getWorldDirection(forward);
    forward.y = 0;
    forward.normalize();
    const right = new THREE.Vector3().crossVectors(forward, camera.up).normalize();

    const moveVector = new THREE.Vector3();
    moveVector.addScaledVector(right, Number(moveRight) - Number(moveLeft));
    moveVector.addScaledVector(forward, Number(moveForward) - Number(moveBackward));
    if (moveVector.lengthSq() > 0) {
        moveVector.normalize();
        velocity.x += moveVector.x * 108.0 * delta;
        velocity.z += moveVector.z * 108.0 * delta;
    }

    camera.position.addScaledVector(velocity, delta);
    if (camera.position.y < 1) {
        velocity.y = 0;
        camera.position.y = 1;
        canJump = true;
    }

    prevTime = time;
    renderer.render(scene, camera);
}

animate();

window.addEventListener('resize', () => {
    camera.aspect = window.innerWidth / window.innerHeight;
    camera.updateProjectionMatrix();
    renderer.setSize(window.innerWidth, window.innerHeight);
});";

pub const HTML_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Exported 3D Game</title>
    <script src="https://unpkg.com/three@0.128.0/build/three.min.js"></script>
    <script src="https://unpkg.com/three@0.128.0/examples/js/loaders/GLTFLoader.js"></script>
    <style>
        body { margin: 0; overflow: hidden; }
        canvas { display: block; }
        #loading {
            position: absolute;
            top: 50%;
            left: 50%;
            transform: translate(-50%, -50%);
            color: white;
            font-family: Arial;
            z-index: 1000;
            font-size: 20px;
            background: rgba(0, 0, 0, 0.7);
            padding: 20px;
            border-radius: 10px;
        }
    </style>
</head>
<body>
    <div id="loading">Loading models and textures...</div>
    <script>
"#;

pub const HTML_TAIL: &str = "    </script>
</body>
</html>
";
